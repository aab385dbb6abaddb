use super::*;

fn fast(timeout_ms: u64) -> PollSettings {
    PollSettings::new(Duration::ZERO, Duration::from_millis(timeout_ms))
}

#[test]
fn returns_first_ready_value() {
    let mut calls = 0;
    let value = wait_until("test", fast(1000), || {
        calls += 1;
        Ok((calls == 3).then_some("ready"))
    })
    .expect("should finish");

    assert_eq!(value, "ready");
    assert_eq!(calls, 3);
}

#[test]
fn times_out_with_typed_error() {
    let result: Result<()> = wait_until("index readiness", fast(20), || Ok(None));
    match result {
        Err(CopilotError::Timeout { operation, .. }) => assert_eq!(operation, "index readiness"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn check_errors_stop_the_wait() {
    let mut calls = 0;
    let result: Result<()> = wait_until("test", fast(1000), || {
        calls += 1;
        Err(CopilotError::Provider("boom".to_string()))
    });

    assert!(matches!(result, Err(CopilotError::Provider(_))));
    assert_eq!(calls, 1);
}

#[test]
fn ready_value_wins_even_with_zero_timeout() {
    let value = wait_until("test", fast(0), || Ok(Some(7))).expect("should finish");
    assert_eq!(value, 7);
}
