//! Pipeline tests over a synthetic reference and a small tree model

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::json;

use super::*;
use crate::logic::drift::DriftOutcome;
use crate::logic::model::{CustomerStatus, RiskLevel};
use crate::logic::testing::{lightgbm_service, sample_payload, service_with, StubClassifier};

#[test]
fn test_end_to_end_sample_payload() {
    let service = lightgbm_service();
    let outcome = service.predict(&sample_payload()).unwrap();

    let p = outcome.probabilities;
    assert!(outcome.prediction == 0 || outcome.prediction == 1);
    assert!((p.attrition + p.retention - 1.0).abs() < 1e-9);

    // Few transactions and a small amount: raw score 1.2 - 0.4
    let expected = 1.0 / (1.0 + (-0.8f64).exp());
    assert!((p.attrition - expected).abs() < 1e-12);
    assert_eq!(outcome.prediction, 1);
    assert_eq!(outcome.status, CustomerStatus::Attrited);
    assert_eq!(outcome.risk_level, RiskLevel::from_probability(p.attrition));
    assert_eq!(outcome.risk_level, RiskLevel::Medium);
}

#[test]
fn test_defaulted_fields_flag_drift_without_blocking() {
    let service = lightgbm_service();
    let outcome = service.predict(&sample_payload()).unwrap();

    // Total_Trans_Ct defaults to 0, below every reference value
    assert_eq!(outcome.drift_detected(), Some(true));
    assert!(outcome.encode_report.missing.contains(&"total_trans_ct".to_string()));

    let snap = service.metrics().snapshot();
    assert_eq!(snap.predictions, 1);
    assert_eq!(snap.drift_detected, 1);
    assert_eq!(snap.errors, 0);
}

#[test]
fn test_indeterminate_drift_still_predicts() {
    let service = lightgbm_service();
    let mut payload = sample_payload();
    // Finite on input, overflows to infinity once standardized
    payload.insert("avg_utilization_ratio".to_string(), json!(1e308));

    let outcome = service.predict(&payload).unwrap();
    assert!(matches!(outcome.drift, DriftOutcome::Indeterminate(_)));
    assert_eq!(outcome.drift_detected(), None);
    assert!(outcome.probabilities.attrition.is_finite());

    let snap = service.metrics().snapshot();
    assert_eq!(snap.predictions, 1);
    assert_eq!(snap.drift_indeterminate, 1);
    assert_eq!(snap.drift_detected, 0);
    assert_eq!(snap.errors, 0);
}

#[test]
fn test_unrecognized_label_still_predicts() {
    let service = lightgbm_service();
    let mut payload = sample_payload();
    payload.insert("education_level".to_string(), json!("Alien"));

    let outcome = service.predict(&payload).unwrap();
    assert_eq!(
        outcome.encode_report.unrecognized,
        vec![("education_level".to_string(), "Alien".to_string())]
    );
}

#[test]
fn test_risk_tiers_follow_probability() {
    let high = service_with(Box::new(StubClassifier::Returns(0.85)));
    let outcome = high.predict(&sample_payload()).unwrap();
    assert_eq!(outcome.risk_level, RiskLevel::High);
    assert_eq!(outcome.status, CustomerStatus::Attrited);

    let low = service_with(Box::new(StubClassifier::Returns(0.4)));
    let outcome = low.predict(&sample_payload()).unwrap();
    assert_eq!(outcome.risk_level, RiskLevel::Low);
    assert_eq!(outcome.prediction, 0);
    assert_eq!(outcome.status, CustomerStatus::Existing);
}

#[test]
fn test_model_failure_carries_stage() {
    let service = service_with(Box::new(StubClassifier::Fails));
    let err = service.predict(&sample_payload()).unwrap_err();

    assert_eq!(err.stage, RequestStage::Predicted);
    assert!(matches!(err.kind, PredictionFailure::Model(_)));

    let snap = service.metrics().snapshot();
    assert_eq!(snap.errors, 1);
    assert_eq!(snap.predictions, 0);
    // Drift ran before the model failed
    assert_eq!(snap.drift_detected, 1);
}

#[test]
fn test_non_finite_probability_rejected() {
    let service = service_with(Box::new(StubClassifier::Returns(f64::NAN)));
    let err = service.predict(&sample_payload()).unwrap_err();
    assert_eq!(err.stage, RequestStage::Predicted);
    assert!(matches!(err.kind, PredictionFailure::NonFiniteProbability(_)));
}

#[test]
fn test_verdict_is_typed() {
    let service = lightgbm_service();
    let outcome = service.predict(&sample_payload()).unwrap();

    match outcome.drift {
        DriftOutcome::Verdict(verdict) => {
            assert_eq!(verdict.batch_size, 1);
            assert_eq!(verdict.p_values.len(), 32);
        }
        DriftOutcome::Indeterminate(reason) => panic!("unexpected indeterminate: {}", reason),
    }
}

#[test]
fn test_counters_monotonic_under_concurrency() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let service = Arc::new(lightgbm_service());
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let service = Arc::clone(&service);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last = service.metrics().snapshot();
            while !done.load(Ordering::Acquire) {
                let now = service.metrics().snapshot();
                assert!(now.predictions >= last.predictions);
                assert!(now.drift_detected >= last.drift_detected);
                last = now;
            }
        })
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    service.predict(&sample_payload()).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::Release);
    observer.join().unwrap();

    let snap = service.metrics().snapshot();
    assert_eq!(snap.predictions, (THREADS * PER_THREAD) as u64);
    assert_eq!(snap.drift_detected, (THREADS * PER_THREAD) as u64);
    assert_eq!(snap.errors, 0);
}
