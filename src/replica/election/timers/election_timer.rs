use crate::actor::WeakActorClient;
use crate::replica::election::timers::time::{Clock, RealClock};
use crate::replica::stop_signal;
use rand::Rng;
use std::ops::RangeInclusive;
use tokio::time::Duration;

/// ElectionTimerHandle keeps the election timer task alive. The task runs for the replica's whole
/// life, whatever its role. It only ticks; the replica decides whether a tick starts an election.
pub(crate) struct ElectionTimerHandle {
    _to_drop: stop_signal::Stopper,
}

struct ElectionTimerTask<C: Clock> {
    timeout_range: RangeInclusive<Duration>,
    actor_client: WeakActorClient,
    clock: C,
    stop_check: stop_signal::StopCheck,
}

impl ElectionTimerHandle {
    pub(crate) fn spawn_timer_task(
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: WeakActorClient,
    ) -> Self {
        let (task, handle) = ElectionTimerTask::new(min_timeout, max_timeout, actor_client, RealClock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<C: Clock> ElectionTimerTask<C> {
    fn new(
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: WeakActorClient,
        clock: C,
    ) -> (Self, ElectionTimerHandle) {
        let (stopper, stop_check) = stop_signal::new();

        let task = ElectionTimerTask {
            timeout_range: RangeInclusive::new(min_timeout, max_timeout),
            actor_client,
            clock,
            stop_check,
        };
        let handle = ElectionTimerHandle { _to_drop: stopper };

        (task, handle)
    }

    fn random_timeout(&self) -> Duration {
        rand::thread_rng().gen_range(self.timeout_range.clone())
    }

    async fn run(mut self) {
        loop {
            // Fresh jitter every round, so that replicas which timed out together don't keep
            // splitting the vote.
            let timeout = self.random_timeout();
            self.clock.sleep(timeout).await;

            if self.stop_check.should_stop() {
                return;
            }
            if self.actor_client.election_timer_tick().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorClient;
    use crate::replica::election::timers::test_utils::TestUtilActor;
    use crate::replica::election::timers::time;

    #[tokio::test]
    async fn election_timer_ticks_every_timeout() {
        // -- setup --
        let timeout = Duration::from_millis(100);
        let (strong_actor_client, rx) = ActorClient::new(10);
        let actor_client = strong_actor_client.weak();
        let mut actor = TestUtilActor::new(rx);

        let (mock_clock, mut mock_clock_controller) = time::mocked_clock();

        // -- execute & verify --
        let (timer_task, _timer_handle) = ElectionTimerTask::new(
            // We are not testing randomness/jitter, so make min/max the same.
            /* min */ timeout,
            /* max */ timeout,
            actor_client,
            mock_clock,
        );
        tokio::task::spawn(timer_task.run());
        actor.assert_no_event().await;

        let one_ns = Duration::from_nanos(1);
        for _ in 0..3 {
            mock_clock_controller.advance(timeout - one_ns);
            actor.assert_no_event().await;

            mock_clock_controller.advance(one_ns);
            actor.assert_election_timer_event().await;
            // Let the task re-arm before moving time again.
            actor.assert_no_event().await;
        }

        assert_eq!(mock_clock_controller.elapsed_time(), timeout * 3);
    }

    #[tokio::test]
    async fn election_timer_exits_on_handle_drop() {
        // -- setup --
        let timeout = Duration::from_millis(100);
        let (strong_actor_client, rx) = ActorClient::new(10);
        let actor_client = strong_actor_client.weak();
        let mut actor = TestUtilActor::new(rx);

        let (mock_clock, mut mock_clock_controller) = time::mocked_clock();

        // -- execute --
        let (timer_task, timer_handle) = ElectionTimerTask::new(timeout, timeout, actor_client, mock_clock);
        let task_join_handle = tokio::task::spawn(timer_task.run());
        actor.assert_no_event().await;
        drop(timer_handle);

        // -- verify --
        // Fast-fwd time past the deadline, and assert the task exited without a tick.
        mock_clock_controller.advance(timeout * 2);
        task_join_handle.await.unwrap();
        actor.assert_no_event().await;
    }

    #[tokio::test]
    async fn election_timer_exits_when_actor_is_gone() {
        let timeout = Duration::from_millis(100);
        let (strong_actor_client, rx) = ActorClient::new(10);
        let actor_client = strong_actor_client.weak();
        let (mock_clock, mut mock_clock_controller) = time::mocked_clock();

        let (timer_task, _timer_handle) = ElectionTimerTask::new(timeout, timeout, actor_client, mock_clock);
        let task_join_handle = tokio::task::spawn(timer_task.run());
        // Let the task arm its first deadline.
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(rx);
        drop(strong_actor_client);
        mock_clock_controller.advance(timeout);
        task_join_handle.await.unwrap();
    }
}
