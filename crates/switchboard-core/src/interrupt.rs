use std::future::Future;

use tracing::debug;

use crate::error::{Error, Result};
use crate::stream::{SessionStream, channels};

/// Runs `work` until it finishes or an interrupt arrives on the interrupt
/// channel, whichever comes first.
///
/// When the work wins, its output is returned untouched and the interrupt
/// listener is released. When the interrupt wins, the work future is dropped
/// before this function returns, so any subscriptions it held are already
/// released, and [`Error::Interrupted`] is returned in place of its output.
///
/// The interrupt listener is registered before the work is first polled. An
/// interrupt published while nothing was racing is buffered by the bus and
/// interrupts the next race.
pub async fn run_until_interrupt<F>(stream: &SessionStream, work: F) -> Result<F::Output>
where
    F: Future,
{
    let mut interrupts = stream.listen(channels::INTERRUPT);
    let mut work = Box::pin(work);

    tokio::select! {
        biased;

        output = &mut work => return Ok(output),

        signal = interrupts.get() => match signal {
            Ok(event) => {
                debug!(interrupt_id = %event.payload().id, "Interrupt received, cancelling work");
                drop(work);
                drop(interrupts);
                return Err(Error::Interrupted);
            }
            Err(_) => {
                debug!("Interrupt listener closed, waiting for work alone");
            }
        },
    }

    drop(interrupts);
    Ok(work.await)
}
