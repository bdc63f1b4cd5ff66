mod election_timer;
mod leader_timer;
mod time;

#[cfg(test)]
mod test_utils;

pub(crate) use election_timer::ElectionTimerHandle;
pub(crate) use leader_timer::LeaderTimerHandle;
