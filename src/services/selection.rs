//! Icon and instant selection
//!
//! Two ways for a collaborator to pick an expiry instant:
//!
//! - [`InstantSelection`], an explicit state machine for UIs that prompt for
//!   the date first and the time of day second;
//! - [`select_instant`], a single call for collaborators that ask once.
//!
//! [`SelectionBroker`] forwards icon and instant requests to whichever
//! collaborator owns the other end of its channel and hands back a receiver
//! for the answer.

use std::sync::mpsc;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::debug;

use crate::error::{CofferError, CofferResult};
use crate::models::{merge_date_components, merge_time_components, DateInstant, IconImage, InstantKind};

/// Where an [`InstantSelection`] stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    AwaitingDate,
    AwaitingTime,
    Complete,
}

/// Date-then-time selection of one instant
///
/// A date-only instant completes after the date step. A date-and-time
/// instant waits for the time step before it completes.
#[derive(Debug, Clone)]
pub struct InstantSelection {
    current: DateInstant,
    state: SelectionState,
}

impl InstantSelection {
    /// Start a selection seeded with the previous value
    pub fn begin(previous: DateInstant) -> Self {
        Self {
            current: previous,
            state: SelectionState::AwaitingDate,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// The instant as selected so far
    pub fn current(&self) -> DateInstant {
        self.current
    }

    /// Supply the date; the time of day is kept
    pub fn select_date(&mut self, year: i32, month: u32, day: u32) -> CofferResult<SelectionState> {
        if self.state != SelectionState::AwaitingDate {
            return Err(CofferError::SelectionOutOfOrder(format!(
                "date supplied while {:?}",
                self.state
            )));
        }
        self.current = merge_date_components(self.current, year, month, day)?;
        self.state = match self.current.kind() {
            InstantKind::Date => SelectionState::Complete,
            InstantKind::DateTime => SelectionState::AwaitingTime,
        };
        Ok(self.state)
    }

    /// Supply the time of day; the date is kept
    pub fn select_time(&mut self, hour: u32, minute: u32) -> CofferResult<SelectionState> {
        if self.state != SelectionState::AwaitingTime {
            return Err(CofferError::SelectionOutOfOrder(format!(
                "time supplied while {:?}",
                self.state
            )));
        }
        self.current = merge_time_components(self.current, hour, minute)?;
        self.state = SelectionState::Complete;
        Ok(self.state)
    }

    /// The selected instant, once every required step is done
    pub fn finish(self) -> CofferResult<DateInstant> {
        match self.state {
            SelectionState::Complete => Ok(self.current),
            state => Err(CofferError::SelectionOutOfOrder(format!(
                "finished while {:?}",
                state
            ))),
        }
    }
}

/// Pick an instant in one call
///
/// Without a `time`, a date-and-time instant keeps the previous time of day.
pub fn select_instant(
    previous: DateInstant,
    date: NaiveDate,
    time: Option<NaiveTime>,
) -> CofferResult<DateInstant> {
    let mut selection = InstantSelection::begin(previous);
    if selection.select_date(date.year(), date.month(), date.day())? == SelectionState::AwaitingTime {
        let time = time.unwrap_or_else(|| previous.value().time());
        selection.select_time(time.hour(), time.minute())?;
    }
    selection.finish()
}

/// A request forwarded to the selecting collaborator
#[derive(Debug)]
pub enum SelectionRequest {
    Icon {
        current: IconImage,
        reply: mpsc::Sender<IconImage>,
    },
    Instant {
        current: DateInstant,
        reply: mpsc::Sender<DateInstant>,
    },
}

/// Sends selection requests to a collaborator
#[derive(Debug, Clone)]
pub struct SelectionBroker {
    requests: mpsc::Sender<SelectionRequest>,
}

impl SelectionBroker {
    /// A broker plus the receiver the collaborator listens on
    pub fn channel() -> (Self, mpsc::Receiver<SelectionRequest>) {
        let (requests, receiver) = mpsc::channel();
        (Self { requests }, receiver)
    }

    /// Ask for an icon; the answer arrives on the returned receiver
    pub fn request_icon_selection(&self, current: IconImage) -> CofferResult<mpsc::Receiver<IconImage>> {
        let (reply, answer) = mpsc::channel();
        self.send(SelectionRequest::Icon { current, reply })?;
        Ok(answer)
    }

    /// Ask for an instant; the answer arrives on the returned receiver
    pub fn request_date_time_selection(
        &self,
        current: DateInstant,
    ) -> CofferResult<mpsc::Receiver<DateInstant>> {
        let (reply, answer) = mpsc::channel();
        self.send(SelectionRequest::Instant { current, reply })?;
        Ok(answer)
    }

    fn send(&self, request: SelectionRequest) -> CofferResult<()> {
        debug!(?request, "Forwarding selection request");
        self.requests
            .send(request)
            .map_err(|_| CofferError::SelectionUnavailable("no collaborator is listening".into()))
    }
}

/// Wait for the answer to a selection request
pub fn await_selection<T>(answer: &mpsc::Receiver<T>) -> CofferResult<T> {
    answer
        .recv()
        .map_err(|_| CofferError::SelectionUnavailable("selection was abandoned".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn date_time(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateInstant {
        DateInstant::date_time(date(y, m, d).and_hms_opt(h, mi, 0).unwrap())
    }

    #[test]
    fn test_date_time_needs_both_steps() {
        let mut selection = InstantSelection::begin(date_time(2024, 1, 1, 9, 15));
        assert_eq!(selection.state(), SelectionState::AwaitingDate);

        assert_eq!(selection.select_date(2025, 6, 30).unwrap(), SelectionState::AwaitingTime);
        assert_eq!(selection.current(), date_time(2025, 6, 30, 9, 15));
        assert!(matches!(
            selection.clone().finish(),
            Err(CofferError::SelectionOutOfOrder(_))
        ));

        assert_eq!(selection.select_time(18, 45).unwrap(), SelectionState::Complete);
        assert_eq!(selection.finish().unwrap(), date_time(2025, 6, 30, 18, 45));
    }

    #[test]
    fn test_date_only_completes_after_date() {
        let mut selection = InstantSelection::begin(DateInstant::date(date(2024, 1, 1)));
        assert_eq!(selection.select_date(2024, 2, 29).unwrap(), SelectionState::Complete);
        assert!(matches!(
            selection.select_time(10, 0),
            Err(CofferError::SelectionOutOfOrder(_))
        ));
        assert_eq!(selection.finish().unwrap(), DateInstant::date(date(2024, 2, 29)));
    }

    #[test]
    fn test_out_of_order_steps() {
        let mut selection = InstantSelection::begin(date_time(2024, 1, 1, 9, 15));
        assert!(matches!(
            selection.select_time(10, 0),
            Err(CofferError::SelectionOutOfOrder(_))
        ));
        selection.select_date(2024, 1, 2).unwrap();
        assert!(matches!(
            selection.select_date(2024, 1, 3),
            Err(CofferError::SelectionOutOfOrder(_))
        ));
    }

    #[test]
    fn test_invalid_date_keeps_state() {
        let mut selection = InstantSelection::begin(date_time(2024, 1, 1, 9, 15));
        assert!(selection.select_date(2023, 2, 29).unwrap_err().is_validation());
        assert_eq!(selection.state(), SelectionState::AwaitingDate);
        assert_eq!(selection.current(), date_time(2024, 1, 1, 9, 15));
    }

    #[test]
    fn test_select_instant() {
        let previous = date_time(2024, 1, 1, 9, 15);
        let kept = select_instant(previous, date(2024, 5, 5), None).unwrap();
        assert_eq!(kept, date_time(2024, 5, 5, 9, 15));

        let time = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        let both = select_instant(previous, date(2024, 5, 5), Some(time)).unwrap();
        assert_eq!(both, date_time(2024, 5, 5, 23, 59));

        let date_only = select_instant(DateInstant::date(date(2024, 1, 1)), date(2024, 5, 5), Some(time)).unwrap();
        assert_eq!(date_only, DateInstant::date(date(2024, 5, 5)));
    }

    #[test]
    fn test_broker_round_trip() {
        let (broker, requests) = SelectionBroker::channel();
        let collaborator = thread::spawn(move || {
            for request in requests {
                match request {
                    SelectionRequest::Icon { current, reply } => {
                        assert_eq!(current, IconImage::group_default());
                        reply.send(IconImage::Standard(7)).unwrap();
                    }
                    SelectionRequest::Instant { current, reply } => {
                        let picked = merge_date_components(current, 2030, 1, 1).unwrap();
                        reply.send(picked).unwrap();
                    }
                }
            }
        });

        let icon = broker.request_icon_selection(IconImage::group_default()).unwrap();
        assert_eq!(await_selection(&icon).unwrap(), IconImage::Standard(7));

        let instant = broker
            .request_date_time_selection(date_time(2024, 1, 1, 9, 15))
            .unwrap();
        assert_eq!(await_selection(&instant).unwrap(), date_time(2030, 1, 1, 9, 15));

        drop(broker);
        collaborator.join().unwrap();
    }

    #[test]
    fn test_broker_without_collaborator() {
        let (broker, requests) = SelectionBroker::channel();
        drop(requests);
        let err = broker
            .request_icon_selection(IconImage::entry_default())
            .unwrap_err();
        assert!(matches!(err, CofferError::SelectionUnavailable(_)));
    }

    #[test]
    fn test_abandoned_selection() {
        let (broker, requests) = SelectionBroker::channel();
        let answer = broker
            .request_icon_selection(IconImage::entry_default())
            .unwrap();
        drop(requests);
        assert!(matches!(
            await_selection(&answer),
            Err(CofferError::SelectionUnavailable(_))
        ));
    }
}
