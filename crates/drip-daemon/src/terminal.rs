//! Line-oriented terminal front end: the notification prompt and the five
//! test renderings, sharing one stdin reader.
//!
//! Input conventions: an empty line acknowledges an intro card, `:q` walks
//! away from the current test, choices are picked by number, typed answers
//! are compared case-insensitively after trimming.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use drip_session::{Challenge, Decision, Notifier, TestDelivery};
use drip_store::{Modality, Outcome};

pub struct Terminal {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self) -> Option<String> {
        let mut input = self.input.lock().await;
        input.next_line().await.ok().flatten()
    }

    /// Read one answer line within the window. Timeout and EOF both come
    /// back as a penalty-free timeout; line input cannot be half-typed,
    /// so partial input is never reported.
    async fn read_answer(&self, window: Duration) -> Result<String, Outcome> {
        match timeout(window, self.read_line()).await {
            Ok(Some(line)) => {
                let line = line.trim().to_string();
                if line == ":q" {
                    Err(Outcome::Escape {
                        partial_input: false,
                    })
                } else {
                    Ok(line)
                }
            }
            Ok(None) | Err(_) => Err(Outcome::timeout()),
        }
    }
}

#[async_trait]
impl Notifier for Terminal {
    async fn notify(&self, due_count: usize) -> Decision {
        println!();
        println!("{due_count} item(s) due for review. Start now? [y/N]");
        match self.read_line().await {
            Some(line) if line.trim().eq_ignore_ascii_case("y") => Decision::Accept,
            Some(_) => Decision::Decline,
            None => Decision::TimedOut,
        }
    }
}

#[async_trait]
impl TestDelivery for Terminal {
    async fn deliver(&self, challenge: &Challenge) -> Outcome {
        let view = &challenge.view;
        debug!(item_id = %view.id, modality = ?view.modality, "rendering test");
        println!();

        match view.modality {
            Modality::Acknowledge => {
                println!("New item: {}", view.prompt);
                println!("Meaning:  {}", view.answer);
                if let Some(ref example) = view.example {
                    println!("Example:  {example}");
                }
                println!("(press Enter to continue, :q to skip)");
                match self.read_answer(challenge.timeout).await {
                    Ok(_) => Outcome::Correct,
                    Err(outcome) => outcome,
                }
            }
            Modality::MultipleChoice | Modality::MultipleChoiceReverse => {
                let (question, correct) = if view.modality == Modality::MultipleChoice {
                    (&view.prompt, &view.answer)
                } else {
                    (&view.answer, &view.prompt)
                };
                let options = interleave(correct, &challenge.distractors);
                println!("{question}");
                for (i, option) in options.iter().enumerate() {
                    println!("  {}) {option}", i + 1);
                }
                println!("(answer with a number, :q to skip)");
                match self.read_answer(challenge.timeout).await {
                    Ok(line) => match line.parse::<usize>() {
                        Ok(n) if (1..=options.len()).contains(&n) && options[n - 1] == *correct => {
                            Outcome::Correct
                        }
                        _ => Outcome::Wrong,
                    },
                    Err(outcome) => outcome,
                }
            }
            Modality::TypedHinted | Modality::Typed => {
                println!("{}", view.prompt);
                if view.modality == Modality::TypedHinted {
                    println!("Hint: {}", view.hint());
                    if let Some(ref example) = view.example {
                        println!("Example: {example}");
                    }
                }
                println!("(type the answer, :q to skip)");
                match self.read_answer(challenge.timeout).await {
                    Ok(line) => {
                        if line.eq_ignore_ascii_case(view.answer.trim()) {
                            Outcome::Correct
                        } else {
                            println!("  expected: {}", view.answer);
                            Outcome::Wrong
                        }
                    }
                    Err(outcome) => outcome,
                }
            }
        }
    }
}

/// Place the correct text among the distractors at a wall-clock-derived
/// position, so its slot varies between tests without a PRNG.
fn interleave(correct: &str, distractors: &[String]) -> Vec<String> {
    let mut options: Vec<String> = distractors.to_vec();
    let slot = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0)
        % (options.len() + 1);
    options.insert(slot, correct.to_string());
    options
}
