use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use crate::errors::check;
use crate::probe::fetch_sized;
use crate::{DpfpError, Fmd, FmdFormat, Matcher, Operation, Status};

mod private {
    pub trait Sealed {}
}

/// Marker for the states an `Enrollment` can be in.
pub trait EnrollmentState: private::Sealed {}

/// Views are still being added.
#[derive(Debug)]
pub enum Collecting {}

/// Enough views were added to create the enrollment template.
#[derive(Debug)]
pub enum Ready {}

impl private::Sealed for Collecting {}
impl private::Sealed for Ready {}
impl EnrollmentState for Collecting {}
impl EnrollmentState for Ready {}

/// Outstanding enrollment on a matcher. Finishing happens exactly once, either through
/// `finish` or when the value is dropped.
#[derive(Debug)]
pub struct Enrollment<'m, S: EnrollmentState> {
    accumulator: Accumulator<'m>,
    _state: PhantomData<S>,
}

/// Outcome of adding a view.
#[derive(Debug)]
pub enum Step<'m> {
    NeedMore(Enrollment<'m, Collecting>),
    Ready(Enrollment<'m, Ready>),
}

#[derive(Debug)]
struct Accumulator<'m> {
    matcher: &'m Matcher,
    format: FmdFormat,
    views: usize,
    finished: bool,
}

impl<'m> Accumulator<'m> {
    fn finish(&mut self) -> crate::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let status = self.matcher.api().finish_enrollment();
        self.matcher.shared.enrolling.store(false, Ordering::SeqCst);
        debug!(views = self.views, "enrollment finished");

        check(status, Operation::FinishEnrollment)
    }
}

impl<'m> Drop for Accumulator<'m> {
    fn drop(&mut self) {
        if let Err(error) = self.finish() {
            warn!(%error, "finishing enrollment failed");
        }
    }
}

impl<'m> Enrollment<'m, Collecting> {
    pub(crate) fn start(matcher: &'m Matcher, format: FmdFormat) -> crate::Result<Self> {
        if matcher
            .shared
            .enrolling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DpfpError::AlreadyInProgress);
        }

        if let Err(error) = check(
            matcher.api().start_enrollment(format.raw()),
            Operation::StartEnrollment,
        ) {
            matcher.shared.enrolling.store(false, Ordering::SeqCst);
            return Err(error);
        }
        debug!(%format, "enrollment started");

        Ok(Enrollment {
            accumulator: Accumulator {
                matcher,
                format,
                views: 0,
                finished: false,
            },
            _state: PhantomData,
        })
    }

    /// Adds one template view. The library answers whether it needs more views or can
    /// create the enrollment template now.
    ///
    /// On error the enrollment is finished and gone.
    pub fn add(mut self, fmd: &Fmd, view: u32) -> crate::Result<Step<'m>> {
        if fmd.format() != self.accumulator.format {
            return Err(DpfpError::InvalidTemplate(format!(
                "expected a {} template, got {}",
                self.accumulator.format,
                fmd.format()
            )));
        }

        let status = Status::from(self.accumulator.matcher.api().add_to_enrollment(
            fmd.format().raw(),
            fmd.as_bytes(),
            view,
        ));
        match status {
            Status::MoreData => {
                self.accumulator.views += 1;
                debug!(views = self.accumulator.views, "enrollment needs more views");
                Ok(Step::NeedMore(self))
            }
            Status::Success => {
                self.accumulator.views += 1;
                debug!(views = self.accumulator.views, "enrollment ready");
                Ok(Step::Ready(Enrollment {
                    accumulator: self.accumulator,
                    _state: PhantomData,
                }))
            }
            status => Err(DpfpError::from_status(Operation::AddToEnrollment, status)),
        }
    }
}

impl<'m> Enrollment<'m, Ready> {
    /// Creates the enrollment template from the accumulated views.
    pub fn create_template(&mut self) -> crate::Result<Fmd> {
        let matcher = self.accumulator.matcher;
        let probed = fetch_sized(Operation::CreateEnrollment, |fmd, size| {
            matcher.api().create_enrollment_fmd(fmd, size)
        })?;
        if probed.data.is_empty() {
            return Err(DpfpError::NotReady);
        }

        Ok(Fmd::new(self.accumulator.format, probed.data))
    }
}

impl<'m, S: EnrollmentState> Enrollment<'m, S> {
    /// Number of views accepted so far.
    pub fn views(&self) -> usize {
        self.accumulator.views
    }

    pub fn format(&self) -> FmdFormat {
        self.accumulator.format
    }

    /// Releases the library's enrollment state.
    pub fn finish(mut self) -> crate::Result<()> {
        self.accumulator.finish()
    }
}
