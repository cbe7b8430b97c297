mod util;

use nx_audio::{
    AudioOutError, PcmFormat, ServiceOp, SwitchAudio, BUFFER_COUNT, SAMPLE_BUFFER_SIZE,
};
use util::{config, Call, Script, ScriptedIpc};

fn init_err(script: Script) -> (AudioOutError, Vec<Call>) {
    let (ipc, handle) = ScriptedIpc::new(script);
    let err = SwitchAudio::init(ipc, &config(64, true))
        .map(|_| ())
        .expect_err("init should fail");
    let calls = handle.borrow().calls.clone();
    (err, calls)
}

#[test]
fn successful_init_primes_the_pool_and_starts_paused() {
    let (ipc, handle) = ScriptedIpc::new(Script::default());
    let mut cfg = config(64, true);
    cfg.rate = 44_100;

    let (swa, rate) = SwitchAudio::init(ipc, &cfg).unwrap();
    assert_eq!(rate, 48_000);
    assert!(!swa.alive());
    assert!(swa.is_blocking());
    assert_eq!(swa.latency_ms(), 64);
    assert_eq!(swa.write_avail(), 0);
    assert_eq!(swa.buffer_size(), SAMPLE_BUFFER_SIZE);
    assert!(!swa.use_float());

    let mut expected = vec![
        Call::Initialize,
        Call::ListOutputs,
        Call::OpenOutput("DeviceOut".into()),
        Call::RegisterBufferEvent,
    ];
    for index in 0..BUFFER_COUNT {
        expected.push(Call::Alloc(index));
        expected.push(Call::Append {
            index,
            data_size: SAMPLE_BUFFER_SIZE,
        });
    }
    assert_eq!(handle.borrow().calls, expected);

    // Pre-submitted buffers are silence.
    let script = handle.borrow();
    assert_eq!(script.queued.len(), BUFFER_COUNT);
    assert!(script
        .appended
        .iter()
        .all(|data| data.len() == SAMPLE_BUFFER_SIZE && data.iter().all(|&b| b == 0)));
    for buffer in &script.queued {
        assert_eq!(buffer.sample_data() as usize % nx_audio::PAGE_SIZE, 0);
    }
}

#[test]
fn nonblocking_when_block_frames_is_off() {
    let (ipc, _handle) = ScriptedIpc::new(Script::default());
    let (swa, _) = SwitchAudio::init(ipc, &config(64, false)).unwrap();
    assert!(!swa.is_blocking());
}

#[test]
fn rejects_zero_outputs() {
    let (err, calls) = init_err(Script {
        outputs: vec![],
        ..Script::default()
    });
    assert!(matches!(err, AudioOutError::EndpointCount { found: 0 }));
    assert_eq!(
        calls,
        vec![Call::Initialize, Call::ListOutputs, Call::Finalize]
    );
}

#[test]
fn rejects_multiple_outputs() {
    let (err, calls) = init_err(Script {
        outputs: vec!["DeviceOut".into(), "HdmiOut".into()],
        ..Script::default()
    });
    assert!(matches!(err, AudioOutError::EndpointCount { found: 2 }));
    assert_eq!(calls.last(), Some(&Call::Finalize));
    assert!(!calls.contains(&Call::Close));
}

#[test]
fn rejects_sample_rate_mismatch_and_unwinds_in_reverse() {
    let mut script = Script::default();
    script.info.sample_rate = 44_100;
    let (err, calls) = init_err(script);

    assert!(matches!(
        err,
        AudioOutError::SampleRate {
            expected: 48_000,
            got: 44_100
        }
    ));
    assert_eq!(
        calls,
        vec![
            Call::Initialize,
            Call::ListOutputs,
            Call::OpenOutput("DeviceOut".into()),
            Call::Close,
            Call::Finalize,
        ]
    );
}

#[test]
fn rejects_channel_count_mismatch() {
    let mut script = Script::default();
    script.info.channel_count = 6;
    let (err, calls) = init_err(script);

    assert!(matches!(
        err,
        AudioOutError::ChannelCount {
            expected: 2,
            got: 6
        }
    ));
    assert_eq!(&calls[calls.len() - 2..], &[Call::Close, Call::Finalize]);
}

#[test]
fn rejects_non_int16_formats() {
    for format in [PcmFormat::Float, PcmFormat::Int32, PcmFormat::Invalid] {
        let mut script = Script::default();
        script.info.sample_format = format;
        let (err, calls) = init_err(script);

        assert!(matches!(err, AudioOutError::SampleFormat { got } if got == format));
        assert_eq!(&calls[calls.len() - 2..], &[Call::Close, Call::Finalize]);
    }
}

#[test]
fn allocation_failure_unwinds_everything() {
    let (err, calls) = init_err(Script {
        fail_alloc_at: Some(1),
        ..Script::default()
    });

    assert!(matches!(
        err,
        AudioOutError::Alloc {
            index: 1,
            size: SAMPLE_BUFFER_SIZE
        }
    ));
    assert_eq!(
        &calls[3..],
        &[
            Call::RegisterBufferEvent,
            Call::Alloc(0),
            Call::Append {
                index: 0,
                data_size: SAMPLE_BUFFER_SIZE
            },
            Call::Alloc(1),
            Call::Close,
            Call::Finalize,
        ]
    );
}

#[test]
fn last_allocation_failure_releases_queued_buffers() {
    let (err, calls) = init_err(Script {
        allocs: 0,
        fail_alloc_at: Some(2),
        ..Script::default()
    });

    assert!(matches!(err, AudioOutError::Alloc { index: 2, .. }));
    let allocs: Vec<_> = calls
        .iter()
        .filter(|call| matches!(call, Call::Alloc(_)))
        .cloned()
        .collect();
    assert_eq!(allocs, vec![Call::Alloc(0), Call::Alloc(1), Call::Alloc(2)]);
    assert_eq!(&calls[calls.len() - 2..], &[Call::Close, Call::Finalize]);
}

#[test]
fn service_failures_during_init_unwind() {
    let cases = [
        (ServiceOp::ListOutputs, false),
        (ServiceOp::OpenOutput, false),
        (ServiceOp::RegisterBufferEvent, true),
        (ServiceOp::AppendBuffer, true),
    ];
    for (op, opened) in cases {
        let mut script = Script::default();
        script.failures.insert(op, 0x1234);
        let (err, calls) = init_err(script);

        assert_eq!(err.service_op(), Some(op), "failing {op}");
        assert_eq!(calls.last(), Some(&Call::Finalize), "failing {op}");
        assert_eq!(calls.contains(&Call::Close), opened, "failing {op}");
    }
}

#[test]
fn initialize_failure_does_not_finalize() {
    let mut script = Script::default();
    script.failures.insert(ServiceOp::Initialize, 1);
    let (err, calls) = init_err(script);

    assert_eq!(err.service_op(), Some(ServiceOp::Initialize));
    assert_eq!(calls, vec![Call::Initialize]);
}

#[test]
fn invalid_latency_is_rejected_before_touching_the_service() {
    let (ipc, handle) = ScriptedIpc::new(Script::default());
    let err = SwitchAudio::init(ipc, &config(0, true))
        .map(|_| ())
        .unwrap_err();

    assert!(matches!(err, AudioOutError::InvalidConfig(_)));
    assert!(handle.borrow().calls.is_empty());
}

#[test]
fn absent_session_teardown_is_a_no_op() {
    let session: Option<SwitchAudio<ScriptedIpc>> = None;
    drop(session);
}
