/*!
# lull-simulator

Deterministic stand-in for the readiness wait, so code that blocks on
descriptors and timers can be tested without a kernel or a real clock.

A test scripts, in order, every poll call the code under test is expected
to make: which descriptors, which requested events, which timeout, and what
comes back. Each real call through [`lull_net::poll`] consumes the head of
the script and must match it exactly. Anything skipped, extra or different
fails the test on the spot.

## Key Components:
- **Expectation:** one scripted poll call and its canned outcome.
- **PollScript:** the ordered queue, usable as a [`lull_net::Poller`].
- **Session:** installs a script on the current thread for the scope of a test.

```ignore
let session = PollScript::new().install();
session.expect_ready(
    Timeout::from_millis(100),
    &[(3, Want::Read), (4, Want::Write)],
    &[Got::Error, Got::Write],
);
// ... run the code under test ...
session.verify();
```
*/

mod expectation;
mod script;

pub use expectation::{Expectation, Got, Scripted, Want};
pub use script::{PollScript, Session};
