use std::os::fd::AsRawFd;

use lull_core::Timeout;
use lull_simulator::{Got, PollScript, Want};
use lull_timer::{wait_code, Timer, TimerError, Wait};

#[test]
fn is_ready_is_a_no_wait_poll() {
    let timer = Timer::new().unwrap();
    let fd = timer.as_raw_fd();
    let session = PollScript::new().install();
    session.expect_ready(Timeout::NO_WAIT, &[(fd, Want::Read)], &[Got::Read]);
    session.expect_ready(Timeout::NO_WAIT, &[(fd, Want::Read)], &[Got::Nothing]);

    assert!(timer.is_ready());
    assert!(!timer.is_ready());
    session.verify();
}

#[test]
fn wait_ready_follows_the_script() {
    let timer = Timer::new().unwrap();
    let fd = timer.as_raw_fd();
    let timeout = Timeout::from_millis(50);
    let session = PollScript::new().install();
    session.expect_ready(timeout, &[(fd, Want::Read)], &[Got::Read]);
    session.expect_ready(timeout, &[(fd, Want::Read)], &[Got::Nothing]);

    assert_eq!(timer.wait_ready(timeout).unwrap(), Wait::Ready);
    assert_eq!(timer.wait_ready(timeout).unwrap(), Wait::TimedOut);
    session.verify();
}

#[test]
fn wait_ready_forwards_forever() {
    let timer = Timer::new().unwrap();
    let session = PollScript::new().install();
    session.expect_ready(Timeout::FOREVER, &[(timer.as_raw_fd(), Want::Read)], &[Got::Read]);

    assert_eq!(timer.wait_ready(Timeout::FOREVER).unwrap(), Wait::Ready);
    session.verify();
}

#[test]
fn poll_failure_is_an_error() {
    let timer = Timer::new().unwrap();
    let timeout = Timeout::from_millis(50);
    let session = PollScript::new().install();
    session.expect_fail(timeout, &[(timer.as_raw_fd(), Want::Read)], libc::EINTR);

    let result = timer.wait_ready(timeout);
    assert_eq!(wait_code(&result), -1);
    match result {
        Err(TimerError::Poll(err)) => assert_eq!(err.raw_os_error(), Some(libc::EINTR)),
        other => panic!("expected poll error, got {other:?}"),
    }
    session.verify();
}

#[test]
fn descriptor_error_is_reported() {
    let timer = Timer::new().unwrap();
    let timeout = Timeout::from_millis(50);
    let session = PollScript::new().install();
    session.expect_ready(timeout, &[(timer.as_raw_fd(), Want::Read)], &[Got::Error]);

    assert!(matches!(
        timer.wait_ready(timeout),
        Err(TimerError::Descriptor(_))
    ));
    session.verify();
}

#[test]
fn carried_expirations_skip_the_poll() {
    let timer = Timer::new().unwrap();
    timer.start_oneshot(Timeout::from_millis(5));
    lull_core::sleep(Timeout::from_millis(20));
    timer.stop();

    // nothing scripted: a poll here would panic
    let session = PollScript::new().install();
    assert!(timer.is_ready());
    assert_eq!(timer.wait_ready(Timeout::FOREVER).unwrap(), Wait::Ready);
    assert_eq!(timer.ack(), 1);
    session.verify();
}
