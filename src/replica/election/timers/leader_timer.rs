use crate::actor::WeakActorClient;
use crate::replica::election::timers::time::{Clock, RealClock};
use crate::replica::{stop_signal, LeaderTimerKind, LeaderTimerTick, Term};
use tokio::time::Duration;

/// LeaderTimerHandle keeps one of the leader's periodic timers alive. The timer belongs to a
/// single term; dropping the handle (i.e. losing leadership) stops it.
pub(crate) struct LeaderTimerHandle {
    _to_drop: stop_signal::Stopper,
}

struct LeaderTimerTask<C: Clock> {
    interval: Duration,
    actor_client: WeakActorClient,
    tick: LeaderTimerTick,
    clock: C,
    stop_check: stop_signal::StopCheck,
}

impl LeaderTimerHandle {
    pub(crate) fn spawn_timer_task(
        interval: Duration,
        actor_client: WeakActorClient,
        term: Term,
        kind: LeaderTimerKind,
    ) -> Self {
        // Add minimal logic in this constructor, as it is untested.
        let (task, handle) = LeaderTimerTask::new(interval, actor_client, term, kind, RealClock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<C: Clock> LeaderTimerTask<C> {
    fn new(
        interval: Duration,
        actor_client: WeakActorClient,
        term: Term,
        kind: LeaderTimerKind,
        clock: C,
    ) -> (Self, LeaderTimerHandle) {
        let (stopper, stop_check) = stop_signal::new();

        let task = LeaderTimerTask {
            interval,
            actor_client,
            tick: LeaderTimerTick { term, kind },
            clock,
            stop_check,
        };
        let handle = LeaderTimerHandle { _to_drop: stopper };

        (task, handle)
    }

    async fn run(mut self) {
        // Notice: The first tick is published immediately. A newly elected leader must assert
        // itself before any follower's election timer fires.
        loop {
            if self.stop_check.should_stop() {
                return;
            }
            if self.actor_client.leader_timer(self.tick.clone()).await.is_err() {
                return;
            }

            self.clock.sleep(self.interval).await;
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
    async fn leader_timer_handle_lifecycle() {
        // -- setup --
        let heartbeat_interval = Duration::from_millis(100);
        let (strong_actor_client, rx) = ActorClient::new(10);
        let actor_client = strong_actor_client.weak();
        let mut actor = TestUtilActor::new(rx);

        let term = Term::new(10);
        let expected_tick = LeaderTimerTick {
            term,
            kind: LeaderTimerKind::Heartbeat,
        };

        let (mock_clock, mut mock_clock_controller) = time::mocked_clock();

        // -- execute & verify --

        // 1. Spawn task, assert there is one event in the queue.
        let (timer_task, timer_handle) = LeaderTimerTask::new(
            heartbeat_interval,
            actor_client,
            term,
            LeaderTimerKind::Heartbeat,
            mock_clock,
        );
        let task_join_handle = tokio::task::spawn(timer_task.run());

        actor.assert_leader_timer_event(expected_tick.clone()).await;
        actor.assert_no_event().await;

        // 2. Advance time and receive a tick each interval
        for _ in 0..5 {
            mock_clock_controller.advance(heartbeat_interval);
            actor.assert_leader_timer_event(expected_tick.clone()).await;
            actor.assert_no_event().await;
        }

        // 3. Advance time by a big leap, still receive single tick
        mock_clock_controller.advance(heartbeat_interval * 5);
        actor.assert_leader_timer_event(expected_tick.clone()).await;
        actor.assert_no_event().await;

        // 4. Drop handle and assert timer task exited without sending more events.
        drop(timer_handle);
        mock_clock_controller.advance(heartbeat_interval);
        task_join_handle.await.unwrap();
        actor.assert_no_event().await;
    }

    #[tokio::test]
    async fn commit_check_ticks_carry_kind() {
        let interval = Duration::from_millis(25);
        let (strong_actor_client, rx) = ActorClient::new(10);
        let mut actor = TestUtilActor::new(rx);
        let (mock_clock, mut mock_clock_controller) = time::mocked_clock();

        let expected_tick = LeaderTimerTick {
            term: Term::new(3),
            kind: LeaderTimerKind::CommitCheck,
        };
        let (timer_task, _timer_handle) = LeaderTimerTask::new(
            interval,
            strong_actor_client.weak(),
            Term::new(3),
            LeaderTimerKind::CommitCheck,
            mock_clock,
        );
        tokio::task::spawn(timer_task.run());

        actor.assert_leader_timer_event(expected_tick.clone()).await;
        actor.assert_no_event().await;
        mock_clock_controller.advance(interval / 2);
        actor.assert_no_event().await;
        mock_clock_controller.advance(interval / 2);
        actor.assert_leader_timer_event(expected_tick).await;
    }
}
