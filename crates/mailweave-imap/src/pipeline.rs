//! Command pipelining.
//!
//! IMAP allows several tagged commands on the wire before their responses
//! arrive, which hides round-trip latency on chatty operations. Two gates
//! bound what may be pipelined:
//!
//! - no command in flight may still owe a literal continuation, and
//! - no command in flight may need exclusive session semantics
//!   (IDLE, AUTHENTICATE, STARTTLS, LOGIN, SELECT/EXAMINE).
//!
//! Completions are delivered in queue order; untagged responses that
//! interleave between pipelined commands are applied to folder state in
//! arrival order.

use std::collections::VecDeque;

use crate::command::Command;
use crate::types::Tag;

/// Default maximum pipeline depth.
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Maximum allowed pipeline depth.
pub const MAX_PIPELINE_DEPTH: usize = 16;

/// Configuration for command pipelining.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of commands in flight at once.
    pub max_depth: usize,
    /// Whether to pipeline at all.
    pub enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a new pipeline configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum pipeline depth.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.clamp(1, MAX_PIPELINE_DEPTH);
        self
    }

    /// Enables or disables pipelining.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// In-flight order tracker for pipelined commands.
///
/// Tracks the tags on the wire so completions can be checked for queue
/// order; servers answer in order, but a mismatch is worth a warning
/// before the engine routes by tag.
#[derive(Debug, Default)]
pub struct Pipeline {
    in_flight: VecDeque<Tag>,
}

impl Pipeline {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Records a command as sent.
    pub fn sent(&mut self, tag: Tag) {
        self.in_flight.push_back(tag);
    }

    /// Marks a command as completed.
    ///
    /// Returns `true` if the tag was in flight.
    pub fn complete(&mut self, tag: &Tag) -> bool {
        if let Some(pos) = self.in_flight.iter().position(|t| t == tag) {
            if pos != 0 {
                tracing::warn!(
                    ?tag,
                    expected = ?self.in_flight.front(),
                    "response arrived out of pipeline order"
                );
            }
            self.in_flight.remove(pos);
            true
        } else {
            false
        }
    }

    /// The next tag a well-behaved server should complete.
    #[must_use]
    pub fn next_expected(&self) -> Option<&Tag> {
        self.in_flight.front()
    }

    /// Drops all tracking state (transport lost).
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}

/// Classification of commands for pipelining safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineSafety {
    /// Safe to pipeline freely.
    Safe,
    /// May be pipelined, but its untagged output interleaves with
    /// neighbors and must be demultiplexed by tag order.
    Caution,
    /// Needs exclusive session semantics; never pipelined.
    Exclusive,
}

impl Command {
    /// Returns this command's pipelining classification.
    #[must_use]
    pub const fn pipeline_safety(&self) -> PipelineSafety {
        match self {
            // Exclusive session semantics: continuation dialogs, state
            // transitions, or capability changes mid-command.
            Self::Idle
            | Self::Authenticate { .. }
            | Self::StartTls
            | Self::Login { .. }
            | Self::Select { .. }
            | Self::Examine { .. } => PipelineSafety::Exclusive,

            // Logout tears the session down; Done is IDLE's terminator.
            Self::Logout | Self::Done => PipelineSafety::Exclusive,

            // Read-only queries interleave freely.
            Self::Noop
            | Self::Capability
            | Self::Id { .. }
            | Self::List { .. }
            | Self::Lsub { .. }
            | Self::Status { .. }
            | Self::Check => PipelineSafety::Safe,

            _ => PipelineSafety::Caution,
        }
    }

    /// Returns true if this command requires an empty pipeline.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self.pipeline_safety(), PipelineSafety::Exclusive)
    }

    /// Returns true if this command carries a message literal.
    #[must_use]
    pub const fn has_literal(&self) -> bool {
        matches!(self, Self::Append { .. } | Self::Replace { .. })
    }
}

/// Splits commands into maximal pipeline-safe batches.
///
/// Exclusive commands land in their own single-element batch.
#[must_use]
pub fn batch_commands(commands: Vec<Command>) -> Vec<Vec<Command>> {
    let mut batches = Vec::new();
    let mut current_batch = Vec::new();

    for cmd in commands {
        if cmd.is_exclusive() || cmd.has_literal() {
            if !current_batch.is_empty() {
                batches.push(std::mem::take(&mut current_batch));
            }
            batches.push(vec![cmd]);
        } else {
            current_batch.push(cmd);
        }
    }

    if !current_batch.is_empty() {
        batches.push(current_batch);
    }

    batches
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::{FetchAttribute, StatusAttribute};
    use crate::types::{Mailbox, SequenceSet};

    fn tag(s: &str) -> Tag {
        Tag::new(s)
    }

    #[test]
    fn config_depth_is_clamped() {
        assert_eq!(PipelineConfig::new().max_depth(100).max_depth, MAX_PIPELINE_DEPTH);
        assert_eq!(PipelineConfig::new().max_depth(0).max_depth, 1);
    }

    #[test]
    fn in_flight_ordering() {
        let mut pipeline = Pipeline::new();
        pipeline.sent(tag("A001"));
        pipeline.sent(tag("A002"));

        assert_eq!(pipeline.next_expected(), Some(&tag("A001")));
        assert!(pipeline.complete(&tag("A001")));
        assert_eq!(pipeline.next_expected(), Some(&tag("A002")));
        assert!(pipeline.complete(&tag("A002")));
        assert!(!pipeline.complete(&tag("A002")));
    }

    #[test]
    fn out_of_order_completion_is_tolerated() {
        let mut pipeline = Pipeline::new();
        pipeline.sent(tag("A001"));
        pipeline.sent(tag("A002"));

        assert!(pipeline.complete(&tag("A002")));
        assert_eq!(pipeline.in_flight_count(), 1);
    }

    #[test]
    fn classification() {
        assert_eq!(Command::Noop.pipeline_safety(), PipelineSafety::Safe);
        assert_eq!(Command::Capability.pipeline_safety(), PipelineSafety::Safe);
        assert_eq!(
            Command::Status {
                mailbox: Mailbox::inbox(),
                items: vec![StatusAttribute::Messages],
            }
            .pipeline_safety(),
            PipelineSafety::Safe
        );
        assert_eq!(
            Command::Fetch {
                set: SequenceSet::All,
                uid: true,
                attributes: vec![FetchAttribute::Flags],
                changed_since: None,
            }
            .pipeline_safety(),
            PipelineSafety::Caution
        );
        assert!(Command::Idle.is_exclusive());
        assert!(Command::StartTls.is_exclusive());
        assert!(
            Command::Login {
                username: String::new(),
                password: String::new()
            }
            .is_exclusive()
        );
        assert!(
            Command::Select {
                mailbox: Mailbox::inbox(),
                condstore: false,
                qresync: None,
            }
            .is_exclusive()
        );
    }

    #[test]
    fn batching_isolates_exclusive_commands() {
        let commands = vec![
            Command::Noop,
            Command::Capability,
            Command::Login {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
            Command::Noop,
            Command::Noop,
        ];

        let batches = batch_commands(commands);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[2].len(), 2);
    }
}
