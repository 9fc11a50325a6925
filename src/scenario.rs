//! Scripted scenarios replayed against an [`EnhancedQueue`].
//!
//! A scenario is a TOML file with an initial window and an ordered list of
//! operations. Replaying it yields one [`Step`] per operation plus the final
//! [`QueueStats`], which the CLI prints as JSON lines.
//!
//! ```toml
//! window = 1
//!
//! [[op]]
//! action = "add"
//! key = "k1"
//! priority = 1
//!
//! [[op]]
//! action = "pop"
//! ```

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{AddOutcome, QueueStats};
use crate::queue::EnhancedQueue;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub window: i64,
    #[serde(default, rename = "op")]
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Op {
    Add {
        key: String,
        #[serde(default)]
        priority: i64,
        /// RFC 3339 string. Defaults to the epoch plus the step index in
        /// seconds, so unstamped adds keep script order among equal priorities.
        #[serde(default)]
        enqueued_at: Option<DateTime<Utc>>,
    },
    Pop,
    PopKey {
        key: String,
    },
    /// Dry-run admission, for the given key or the best pending one.
    /// Several probes run under one lock acquisition.
    Probe {
        #[serde(default)]
        keys: Vec<String>,
    },
    Release {
        key: String,
    },
    Cancel {
        key: String,
    },
    SetWindow {
        window: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Added { outcome: AddOutcome },
    Admitted { key: Option<String> },
    Probed { admissible: Vec<Option<String>> },
    Released { released: bool },
    Cancelled { cancelled: bool },
    Window { window: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub index: usize,
    pub op: Op,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Replay {
    pub steps: Vec<Step>,
    pub stats: QueueStats,
}

impl Scenario {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Run every operation against a fresh queue.
    pub fn replay(&self) -> Replay {
        let queue = EnhancedQueue::new(self.window);
        let steps = self
            .ops
            .iter()
            .enumerate()
            .map(|(index, op)| Step {
                index,
                op: op.clone(),
                outcome: apply(&queue, index, op),
            })
            .collect();
        Replay {
            steps,
            stats: queue.stats(),
        }
    }
}

fn apply(queue: &EnhancedQueue, index: usize, op: &Op) -> Outcome {
    match op {
        Op::Add {
            key,
            priority,
            enqueued_at,
        } => {
            let at = enqueued_at.unwrap_or_else(|| default_enqueued_at(index));
            Outcome::Added {
                outcome: queue.add(key.as_str(), *priority, at),
            }
        }
        Op::Pop => Outcome::Admitted {
            key: queue.pop_pending(),
        },
        Op::PopKey { key } => Outcome::Admitted {
            key: queue.pop_pending_key(key),
        },
        Op::Probe { keys } => {
            let mut state = queue.lock();
            let admissible = if keys.is_empty() {
                vec![state.pop_pending(true)]
            } else {
                keys.iter()
                    .map(|key| state.pop_pending_key(key, true))
                    .collect()
            };
            Outcome::Probed { admissible }
        }
        Op::Release { key } => Outcome::Released {
            released: queue.release(key),
        },
        Op::Cancel { key } => Outcome::Cancelled {
            cancelled: queue.remove_pending(key).is_some(),
        },
        Op::SetWindow { window } => {
            queue.set_processing_window(*window);
            Outcome::Window {
                window: queue.processing_window(),
            }
        }
    }
}

fn default_enqueued_at(index: usize) -> DateTime<Utc> {
    DateTime::<Utc>::default() + TimeDelta::seconds(index as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
window = 1

[[op]]
action = "add"
key = "k1"
priority = 1

[[op]]
action = "add"
key = "k2"
priority = 2

[[op]]
action = "probe"
keys = ["k1", "k2", "nope"]

[[op]]
action = "pop"

[[op]]
action = "pop"

[[op]]
action = "set-window"
window = 2

[[op]]
action = "pop-key"
key = "k1"

[[op]]
action = "release"
key = "k2"
"#;

    #[test]
    fn parses_and_replays() {
        let scenario = Scenario::from_toml_str(SCRIPT).unwrap();
        assert_eq!(scenario.window, 1);
        assert_eq!(scenario.ops.len(), 8);

        let replay = scenario.replay();
        let outcomes: Vec<_> = replay.steps.iter().map(|s| s.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Added {
                    outcome: AddOutcome::Inserted
                },
                Outcome::Added {
                    outcome: AddOutcome::Inserted
                },
                Outcome::Probed {
                    admissible: vec![Some("k1".into()), Some("k2".into()), None]
                },
                Outcome::Admitted {
                    key: Some("k2".into())
                },
                Outcome::Admitted { key: None },
                Outcome::Window { window: 2 },
                Outcome::Admitted {
                    key: Some("k1".into())
                },
                Outcome::Released { released: true },
            ]
        );
        assert_eq!(replay.stats.processing, 1);
        assert_eq!(replay.stats.pending, 0);
    }

    #[test]
    fn explicit_timestamps_override_script_order() {
        let script = r#"
window = 1

[[op]]
action = "add"
key = "late"
enqueued_at = "2024-01-01T00:00:10Z"

[[op]]
action = "add"
key = "early"
enqueued_at = "2024-01-01T00:00:00Z"

[[op]]
action = "pop"
"#;
        let replay = Scenario::from_toml_str(script).unwrap().replay();
        assert_eq!(
            replay.steps[2].outcome,
            Outcome::Admitted {
                key: Some("early".into())
            }
        );
    }

    #[test]
    fn unknown_action_is_a_parse_error() {
        let script = r#"
[[op]]
action = "explode"
"#;
        assert!(Scenario::from_toml_str(script).is_err());
    }
}
