use crate::spi_drv::{Direction, Error};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
  Ready,
  BusyTx,
  BusyRx,
  BusyTxRx,
  Error,
  Abort,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
  Start(Direction),
  EndOfTransfer,
  Fault(Error),
  Abort,
  Recover,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Action {
  DoNothing,
  Begin(Direction),
  Finish,
  RecordFault(Error),
  Teardown,
  Release,
  Reject,
}

impl State {
  pub fn next(self, event: &Event) -> (State, Action) {
    match (self, event) {
      (State::Ready, Event::Start(d)) => {
        (State::busy(*d), Action::Begin(*d))
      }
      (s, Event::EndOfTransfer) if s.is_busy() => {
        (State::Ready, Action::Finish)
      }
      // flags can latch with no transfer running, recover from those too
      (s, Event::Fault(e)) if s.is_busy() || s == State::Ready => {
        (State::Error, Action::RecordFault(*e))
      }
      (s, Event::Abort) if s.is_busy() => {
        (State::Abort, Action::Teardown)
      }
      (State::Error, Event::Recover) | (State::Abort, Event::Recover) => {
        (State::Ready, Action::Release)
      }
      (State::Ready, Event::Recover) => {
        (State::Ready, Action::DoNothing)
      }
      (s, _e) => {
        (s, Action::Reject)
      }
    }
  }

  pub fn busy(direction: Direction) -> State {
    match direction {
      Direction::Tx => State::BusyTx,
      Direction::Rx => State::BusyRx,
      Direction::TxRx => State::BusyTxRx,
    }
  }

  pub fn is_busy(self) -> bool {
    matches!(self, State::BusyTx | State::BusyRx | State::BusyTxRx)
  }

  pub fn direction(self) -> Option<Direction> {
    match self {
      State::BusyTx => Some(Direction::Tx),
      State::BusyRx => Some(Direction::Rx),
      State::BusyTxRx => Some(Direction::TxRx),
      _ => None,
    }
  }
}

impl Default for State {
  fn default() -> Self {
    State::Ready
  }
}
