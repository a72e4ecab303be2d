/// Trailing-edge debouncing for bursts of input such as window resizes.
///
/// Every signal replaces the pending value and bumps a generation counter.
/// The caller schedules [`Debouncer::wait`] for each signal; only the wait
/// holding the latest generation gets a value out of [`Debouncer::fire`].

use std::time::Duration;

/// Handed out per signal; fires only if no newer signal arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket(u64);

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    generation: u64,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    /// Record a new value, cancelling whatever was scheduled before
    pub fn signal(&mut self, value: T) -> DebounceTicket {
        self.generation += 1;
        self.pending = Some(value);
        DebounceTicket(self.generation)
    }

    /// Future that resolves with `ticket` once the quiet period is over
    pub fn wait(&self, ticket: DebounceTicket) -> impl std::future::Future<Output = DebounceTicket> + Send + 'static {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            ticket
        }
    }

    /// The settled value, if `ticket` is still the latest signal
    pub fn fire(&mut self, ticket: DebounceTicket) -> Option<T> {
        if ticket.0 != self.generation {
            return None;
        }
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_resize_burst_fires_once_with_final_width() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();

        let first = debouncer.signal(800.0_f32);
        let first_wait = tokio::spawn(debouncer.wait(first));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = debouncer.signal(640.0);
        let second_wait = tokio::spawn(debouncer.wait(second));

        let first = first_wait.await.unwrap();
        assert_eq!(debouncer.fire(first), None);

        let second = second_wait.await.unwrap();
        assert_eq!(debouncer.fire(second), Some(640.0));
        assert_eq!(start.elapsed(), Duration::from_millis(150));

        // nothing left to fire
        assert_eq!(debouncer.fire(second), None);
    }

    #[test]
    fn test_single_signal_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let ticket = debouncer.signal(1024.0_f32);
        assert_eq!(debouncer.fire(ticket), Some(1024.0));
        assert_eq!(debouncer.fire(ticket), None);
    }
}
