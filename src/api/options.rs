use std::convert::TryFrom;
use tokio::time::Duration;

/// RaftOptions are optional overrides of the peer's timing. Unset fields take the defaults.
#[derive(Clone, Default, Debug)]
pub struct RaftOptions {
    pub leader_heartbeat_duration: Option<Duration>,
    pub election_min_timeout: Option<Duration>,
    pub election_max_timeout: Option<Duration>,
    /// Upper bound on collecting votes for one election attempt.
    pub election_ceiling: Option<Duration>,
    pub leader_append_entries_timeout: Option<Duration>,
    pub leader_commit_check_interval: Option<Duration>,
    /// Pause before re-sending to a follower after a call failed or timed out.
    pub replication_retry_delay: Option<Duration>,
    /// How long a caught-up follower's replication task waits for new entries before checking
    /// in again.
    pub replication_idle_poll: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RaftOptionsValidated {
    pub(crate) leader_heartbeat_duration: Duration,
    pub(crate) election_min_timeout: Duration,
    pub(crate) election_max_timeout: Duration,
    pub(crate) election_ceiling: Duration,
    pub(crate) leader_append_entries_timeout: Duration,
    pub(crate) leader_commit_check_interval: Duration,
    pub(crate) replication_retry_delay: Duration,
    pub(crate) replication_idle_poll: Duration,
}

impl RaftOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        let all = [
            self.leader_heartbeat_duration,
            self.election_min_timeout,
            self.election_max_timeout,
            self.election_ceiling,
            self.leader_append_entries_timeout,
            self.leader_commit_check_interval,
            self.replication_retry_delay,
            self.replication_idle_poll,
        ];
        if all.iter().any(|duration| *duration == Duration::from_millis(0)) {
            return Err("Durations must be non-zero");
        }
        if self.leader_heartbeat_duration >= self.election_min_timeout {
            return Err("Election minimum timeout must be greater than leader's heartbeat");
        }
        if self.election_min_timeout > self.election_max_timeout {
            return Err("Election minimum timeout must not exceed maximum timeout");
        }
        if self.leader_append_entries_timeout >= self.election_min_timeout {
            return Err("Leader's AppendEntries RPC timeout must be less than the election timeout");
        }
        if self.leader_commit_check_interval > self.leader_heartbeat_duration {
            return Err("Leader's commit check interval must not exceed its heartbeat");
        }

        Ok(())
    }
}

impl TryFrom<RaftOptions> for RaftOptionsValidated {
    type Error = &'static str;

    fn try_from(options: RaftOptions) -> Result<Self, Self::Error> {
        let leader_heartbeat_duration = options.leader_heartbeat_duration.unwrap_or(Duration::from_millis(100));
        let values = RaftOptionsValidated {
            leader_heartbeat_duration,
            election_min_timeout: options.election_min_timeout.unwrap_or(Duration::from_millis(300)),
            election_max_timeout: options.election_max_timeout.unwrap_or(Duration::from_millis(550)),
            election_ceiling: options.election_ceiling.unwrap_or(Duration::from_millis(600)),
            leader_append_entries_timeout: options
                .leader_append_entries_timeout
                .unwrap_or(Duration::from_millis(250)),
            leader_commit_check_interval: options
                .leader_commit_check_interval
                .unwrap_or(Duration::from_millis(25)),
            replication_retry_delay: options.replication_retry_delay.unwrap_or(Duration::from_millis(20)),
            replication_idle_poll: options.replication_idle_poll.unwrap_or(leader_heartbeat_duration),
        };

        values.validate()?;
        Ok(values)
    }
}
