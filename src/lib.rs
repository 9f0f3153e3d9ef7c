//! xvfdiag is a diagnostic and tuning toolkit for the ReSpeaker XVF3800
//! four-microphone array. It drives the vendor's `xvf_host` control
//! executable one command at a time, checks every write against a table of
//! known commands before anything reaches the device, and decodes the
//! textual answers into typed values.
//!
//! The pieces, bottom up:
//!
//! - [`command_registry`] is the table of known commands with their access
//!   mode, parameter count, type and range.
//! - [`control`] spawns the control executable behind the
//!   [`ControlChannel`](control::ControlChannel) trait.
//! - [`dispatcher`] validates, sends and decodes, one command in flight at
//!   a time.
//! - [`session`] stages parameter edits and applies them as a batch.
//! - [`monitor`] periodically samples the echo canceller, and [`gui`] shows
//!   it in the terminal.
//! - [`analysis`] computes level statistics and spectra of recordings.

#![warn(missing_docs)]
pub mod analysis;
pub mod args;
pub mod command_registry;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod gui;
pub mod monitor;
pub mod response;
pub mod session;
pub mod value;

/// An iterator adapter that turns an iterator of rows into an iterator of
/// columns, based on
/// [this StackOverflow answer](https://stackoverflow.com/a/75477884/17443903).
/// Iteration ends with the shortest row; an empty outer iterator yields
/// nothing.
pub struct TransposeIter<I, T>
where
    I: IntoIterator<Item = T>,
{
    iterators: Vec<I::IntoIter>,
}

#[allow(missing_docs)]
pub trait TransposableIter<I, T>
where
    Self: Sized,
    Self: IntoIterator<Item = I>,
    I: IntoIterator<Item = T>,
{
    fn transpose(self) -> TransposeIter<I, T> {
        let iterators: Vec<_> = self.into_iter().map(|i| i.into_iter()).collect();
        TransposeIter { iterators }
    }
}

impl<I, T> Iterator for TransposeIter<I, T>
where
    I: IntoIterator<Item = T>,
{
    type Item = Vec<T>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.iterators.is_empty() {
            return None;
        }
        self.iterators.iter_mut().map(|iter| iter.next()).collect()
    }
}

impl<I, T, Any> TransposableIter<I, T> for Any
where
    Any: IntoIterator<Item = I>,
    I: IntoIterator<Item = T>,
{
}
