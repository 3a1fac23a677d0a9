use super::BaudError;
use crate::baud::{self, STANDARD_BAUD_RATES};
use crate::control::Sleeper;
use crate::line::SerialLine;
use crate::log_sink::{LogSink, Severity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Time the receiver needs to re-lock after a rate change.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Progress of a negotiation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationAttempt {
    /// Rate last read back from the line.
    pub current: u32,
    pub target: u32,
    /// Index into the standard table being considered.
    pub step: usize,
}

impl NegotiationAttempt {
    pub fn reached(&self) -> bool {
        self.current == self.target
    }

    /// Whether the table entry at `candidate` can be skipped: the line is
    /// already at or past it and the target lies beyond it.
    fn passed(&self, candidate: u32) -> bool {
        self.current >= candidate && self.target > candidate
    }
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationReport {
    pub target: u32,
    /// Rate reported by the line before any change.
    pub initial: u32,
    pub achieved: u32,
    /// Every rate programmed, in order.
    pub steps: Vec<u32>,
}

/// Walks a line from its current rate to a target rate.
pub struct BaudRateNegotiator {
    sink: Arc<dyn LogSink>,
    sleeper: Arc<dyn Sleeper>,
    settle_delay: Duration,
}

impl BaudRateNegotiator {
    pub fn new(sink: Arc<dyn LogSink>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            sink,
            sleeper,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Bring `line` to `target`.
    ///
    /// Does not retry: the first failed set or readback ends the
    /// negotiation. Exhausting the table without the line reporting
    /// `target` yields [`BaudError::UnreachableTarget`].
    pub fn negotiate(
        &self,
        line: &mut dyn SerialLine,
        target: u32,
    ) -> Result<NegotiationReport, BaudError> {
        self.sink.log(
            Severity::Debug,
            "Gradually changing the baud rate to the desired value...",
        );

        let initial = self.read_back(line)?;
        self.sink
            .log(Severity::Debug, &format!("Current baud rate is {initial}"));
        if baud::position(initial).is_none() {
            self.sink.log(
                Severity::Debug,
                &format!("{initial} is not a standard rate, stepping from the bottom of the table"),
            );
        }

        let mut attempt = NegotiationAttempt {
            current: initial,
            target,
            step: 0,
        };
        let mut steps = Vec::new();

        for (step, &candidate) in STANDARD_BAUD_RATES.iter().enumerate() {
            attempt.step = step;
            if attempt.reached() {
                break;
            }
            if attempt.passed(candidate) {
                continue;
            }

            if let Err(source) = line.set_baud_rate(candidate) {
                let err = BaudError::Set {
                    rate: candidate,
                    source,
                };
                self.report_failure(&err);
                return Err(err);
            }
            steps.push(candidate);

            self.sleeper.sleep(self.settle_delay);

            attempt.current = self.read_back(line)?;
            self.sink.log(
                Severity::Debug,
                &format!(
                    "Set baud rate to {} (table step {})",
                    attempt.current, attempt.step
                ),
            );
        }

        if !attempt.reached() {
            let err = BaudError::UnreachableTarget {
                target,
                achieved: attempt.current,
            };
            self.report_failure(&err);
            return Err(err);
        }

        self.sink.log(
            Severity::Info,
            &format!(
                "Baud rate of {} is {} after {} step(s)",
                line.name(),
                attempt.current,
                steps.len()
            ),
        );

        Ok(NegotiationReport {
            target,
            initial,
            achieved: attempt.current,
            steps,
        })
    }

    fn read_back(&self, line: &dyn SerialLine) -> Result<u32, BaudError> {
        line.baud_rate().map_err(|source| {
            let err = BaudError::Readback(source);
            self.report_failure(&err);
            err
        })
    }

    fn report_failure(&self, err: &BaudError) {
        self.sink
            .log(Severity::Error, &format!("Baud rate negotiation failed: {err}"));
        self.sink.log(
            Severity::Info,
            &format!("Additional info about error is {err:?}"),
        );
    }
}

impl std::fmt::Debug for BaudRateNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaudRateNegotiator")
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RecordingSleeper;
    use crate::line::{MockSerialLine, PortError, Readback};
    use crate::log_sink::RecordingSink;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn negotiator() -> (BaudRateNegotiator, RecordingSink, RecordingSleeper) {
        let sink = RecordingSink::new();
        let sleeper = RecordingSleeper::new();
        let negotiator =
            BaudRateNegotiator::new(Arc::new(sink.clone()), Arc::new(sleeper.clone()));
        (negotiator, sink, sleeper)
    }

    #[test]
    fn test_steps_up_from_9600_to_115200() {
        let (negotiator, _, sleeper) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 9600);
        let view = line.view();

        let report = negotiator.negotiate(&mut line, 115200).unwrap();

        assert_eq!(report.steps, vec![19200, 38400, 57600, 115200]);
        assert_eq!(view.baud_sets(), report.steps);
        assert_eq!(report.initial, 9600);
        assert_eq!(report.achieved, 115200);
        assert_eq!(sleeper.naps(), vec![DEFAULT_SETTLE_DELAY; 4]);
    }

    #[test]
    fn test_debug_log_names_table_step() {
        let (negotiator, sink, _) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 57600);

        negotiator.negotiate(&mut line, 230400).unwrap();

        assert!(sink.contains(Severity::Debug, "Set baud rate to 115200 (table step 7)"));
        assert!(sink.contains(Severity::Debug, "Set baud rate to 230400 (table step 8)"));
        assert!(!sink.contains(Severity::Debug, "table step 6"));
    }

    #[test]
    fn test_already_at_target_changes_nothing() {
        let (negotiator, sink, sleeper) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 115200);
        let view = line.view();

        let report = negotiator.negotiate(&mut line, 115200).unwrap();

        assert!(report.steps.is_empty());
        assert!(view.baud_sets().is_empty());
        assert_eq!(sleeper.count(), 0);
        assert!(sink.contains(Severity::Info, "is 115200"));
    }

    #[test]
    fn test_target_below_current_walks_ascending() {
        let (negotiator, _, _) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 115200);

        let report = negotiator.negotiate(&mut line, 9600).unwrap();

        assert_eq!(report.steps, vec![9600]);
        assert_eq!(report.achieved, 9600);
    }

    #[test]
    fn test_unknown_initial_rate_starts_from_bottom() {
        let (negotiator, sink, _) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 0);

        let report = negotiator.negotiate(&mut line, 4800).unwrap();

        assert_eq!(report.steps, vec![1200, 2400, 4800]);
        assert!(sink.contains(Severity::Debug, "not a standard rate"));
    }

    #[test]
    fn test_initial_readback_failure() {
        let (negotiator, sink, _) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 9600).failing_read_at(1);
        let view = line.view();

        let result = negotiator.negotiate(&mut line, 115200);

        assert!(matches!(result, Err(BaudError::Readback(PortError::Io(_)))));
        assert!(view.baud_sets().is_empty());
        assert_eq!(sink.count(Severity::Error), 1);
        assert!(sink.contains(Severity::Info, "Additional info"));
    }

    #[test]
    fn test_readback_failure_mid_walk_stops_immediately() {
        let (negotiator, _, _) = negotiator();
        // Read 1 is the initial read, read 3 follows the second set.
        let mut line = MockSerialLine::new("/dev/ttyACM0", 9600).failing_read_at(3);
        let view = line.view();

        let result = negotiator.negotiate(&mut line, 115200);

        assert!(matches!(result, Err(BaudError::Readback(_))));
        assert_eq!(view.baud_sets(), vec![19200, 38400]);
    }

    #[test]
    fn test_rejected_rate_is_reported() {
        let (negotiator, sink, _) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 115200).failing_set_at(460800);

        let result = negotiator.negotiate(&mut line, 921600);

        match result {
            Err(BaudError::Set { rate, .. }) => assert_eq!(rate, 460800),
            other => panic!("expected set failure, got {:?}", other),
        }
        assert!(sink.contains(Severity::Error, "460800"));
    }

    #[test]
    fn test_silently_ignored_sets_exhaust_the_table() {
        let (negotiator, _, sleeper) = negotiator();
        let mut line =
            MockSerialLine::new("/dev/ttyACM0", 9600).with_readback(Readback::Stuck(9600));

        let result = negotiator.negotiate(&mut line, 115200);

        assert!(matches!(
            result,
            Err(BaudError::UnreachableTarget {
                target: 115200,
                achieved: 9600
            })
        ));
        // Every rate above 9600 was tried once.
        assert_eq!(sleeper.count(), 17);
    }

    #[test]
    fn test_non_table_target_is_unreachable() {
        let (negotiator, _, _) = negotiator();
        let mut line = MockSerialLine::new("/dev/ttyACM0", 9600);

        let result = negotiator.negotiate(&mut line, 14400);

        assert!(matches!(
            result,
            Err(BaudError::UnreachableTarget { target: 14400, .. })
        ));
    }

    #[test]
    fn test_custom_settle_delay() {
        let sleeper = RecordingSleeper::new();
        let negotiator =
            BaudRateNegotiator::new(Arc::new(RecordingSink::new()), Arc::new(sleeper.clone()))
                .with_settle_delay(Duration::from_millis(50));
        let mut line = MockSerialLine::new("/dev/ttyACM0", 57600);

        negotiator.negotiate(&mut line, 115200).unwrap();

        assert_eq!(sleeper.naps(), vec![Duration::from_millis(50)]);
    }

    #[test]
    fn test_every_table_rate_is_reachable_from_every_table_rate() {
        for &from in STANDARD_BAUD_RATES.iter() {
            for &to in STANDARD_BAUD_RATES.iter() {
                let (negotiator, _, _) = negotiator();
                let mut line = MockSerialLine::new("/dev/ttyACM0", from);
                let report = negotiator.negotiate(&mut line, to).unwrap();
                assert_eq!(report.achieved, to, "from {from} to {to}");
            }
        }
    }

    proptest! {
        #[test]
        fn prop_steps_are_ascending_and_end_at_target(
            from in proptest::sample::select(STANDARD_BAUD_RATES.to_vec()),
            to in proptest::sample::select(STANDARD_BAUD_RATES.to_vec()),
        ) {
            let (negotiator, _, _) = negotiator();
            let mut line = MockSerialLine::new("/dev/ttyACM0", from);

            let report = negotiator.negotiate(&mut line, to).unwrap();

            prop_assert!(report.steps.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(report.steps.last().copied().unwrap_or(from), to);
            prop_assert!(report.steps.iter().all(|rate| crate::baud::is_standard(*rate)));
        }
    }
}
