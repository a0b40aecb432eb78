//! Integration tests for the smosvm library
//!
//! These tests verify end-to-end functionality across multiple modules
//! and validate real-world usage scenarios.

use approx::assert_abs_diff_eq;
use smosvm::api::{evaluate_classification, evaluate_regression, SVM};
use smosvm::persistence::{load_model, save_model};
use smosvm::{
    CancelToken, Formulation, KernelType, ModelParts, Problem, SVMError, SparseVector, SvmModel,
    SvmParams,
};
use std::io::Write;
use tempfile::NamedTempFile;

/// Two interleaved blobs, optionally overlapping
fn two_blobs(n_per_class: usize, separation: f64) -> Problem {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..n_per_class {
        let t = i as f64 / n_per_class as f64;
        let (dx, dy) = ((6.0 * t).sin() * 0.8, (4.0 * t).cos() * 0.8);
        x.push(SparseVector::from_dense(&[separation + dx, separation + dy]));
        y.push(1.0);
        x.push(SparseVector::from_dense(&[-separation - dy, -separation + dx]));
        y.push(-1.0);
    }
    Problem::new(x, y).unwrap()
}

fn three_classes() -> Problem {
    let centers = [(0.0, 3.0), (3.0, -2.0), (-3.0, -2.0)];
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..8 {
        let t = i as f64 / 8.0 * std::f64::consts::TAU;
        for (c, (cx, cy)) in centers.iter().enumerate() {
            x.push(SparseVector::from_dense(&[cx + 0.5 * t.cos(), cy + 0.5 * t.sin()]));
            y.push([5.0, 7.0, 9.0][c]);
        }
    }
    Problem::new(x, y).unwrap()
}

fn line(n: usize) -> Problem {
    let x = (0..n)
        .map(|i| SparseVector::from_dense(&[0.05 + 0.9 * i as f64 / (n - 1) as f64]))
        .collect::<Vec<_>>();
    let y = x.iter().map(|v| 2.0 * v.get(1) + 1.0).collect();
    Problem::new(x, y).unwrap()
}

/// Test complete workflow: data loading -> training -> evaluation
#[test]
fn test_complete_workflow_libsvm() {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(temp_file, "+1 1:2.0 2:1.0").expect("Failed to write");
    writeln!(temp_file, "+1 1:1.8 2:1.1").expect("Failed to write");
    writeln!(temp_file, "+1 1:2.2 2:0.9").expect("Failed to write");
    writeln!(temp_file, "-1 1:-2.0 2:-1.0").expect("Failed to write");
    writeln!(temp_file, "-1 1:-1.8 2:-1.1").expect("Failed to write");
    writeln!(temp_file, "-1 1:-2.2 2:-0.9").expect("Failed to write");
    temp_file.flush().expect("Failed to flush");

    let model = SVM::new(Formulation::CSvc { c: 1.0 })
        .with_kernel(KernelType::Linear)
        .with_epsilon(0.001)
        .train_from_file(temp_file.path())
        .expect("Training should succeed");

    let dataset = smosvm::LibSVMDataset::from_file(temp_file.path()).unwrap();
    let problem = smosvm::Dataset::to_problem(&dataset).unwrap();
    let metrics = evaluate_classification(&model, &problem);

    assert_eq!(metrics.accuracy(), 1.0);
    assert_eq!(metrics.f1_score(), 1.0);
    assert!(model.total_sv() > 0 && model.total_sv() <= 6);
    assert_eq!(model.labels(), &[1, -1]);
}

#[test]
fn test_separable_data_is_fit_exactly() {
    let problem = two_blobs(20, 3.0);
    for kernel in [
        KernelType::Linear,
        KernelType::Rbf { gamma: 0.0 },
        KernelType::Polynomial {
            degree: 2,
            gamma: 0.5,
            coef0: 1.0,
        },
    ] {
        let model = SVM::new(Formulation::CSvc { c: 10.0 })
            .with_kernel(kernel)
            .train(&problem)
            .unwrap();
        assert_eq!(
            evaluate_classification(&model, &problem).accuracy(),
            1.0,
            "kernel {:?}",
            kernel
        );
    }
}

#[test]
fn test_nu_svc_fits_separable_data() {
    let problem = two_blobs(15, 3.0);
    let model = SVM::new(Formulation::NuSvc { nu: 0.3 })
        .with_kernel(KernelType::Linear)
        .train(&problem)
        .unwrap();
    assert_eq!(evaluate_classification(&model, &problem).accuracy(), 1.0);
}

#[test]
fn test_one_class_rejects_far_outlier() {
    // points spread over a disk around (1, 1)
    let x: Vec<SparseVector> = (0..30)
        .map(|i| {
            let angle = i as f64 * 2.4;
            let radius = 0.4 * ((i % 5) + 1) as f64;
            SparseVector::from_dense(&[1.0 + radius * angle.cos(), 1.0 + radius * angle.sin()])
        })
        .collect();
    let problem = Problem::new(x, vec![1.0; 30]).unwrap();
    let model = SVM::new(Formulation::OneClass { nu: 0.1 })
        .with_kernel(KernelType::Rbf { gamma: 0.5 })
        .train(&problem)
        .unwrap();

    assert_eq!(model.predict(&SparseVector::from_dense(&[40.0, -40.0])), -1.0);

    let inliers = problem
        .features()
        .iter()
        .filter(|x| model.predict(x) > 0.0)
        .count();
    assert!(inliers >= 9, "only {} training points accepted", inliers);
    assert!(model.labels().is_empty());
    assert_eq!(model.sv_coef().len(), 1);
}

#[test]
fn test_epsilon_svr_fits_line() {
    let problem = line(20);
    let model = SVM::new(Formulation::EpsilonSvr { c: 100.0, p: 0.01 })
        .with_kernel(KernelType::Linear)
        .train(&problem)
        .unwrap();

    let metrics = evaluate_regression(&model, &problem);
    assert!(metrics.mean_squared_error < 1e-3);
    assert!(metrics.squared_correlation > 0.99);
    assert_abs_diff_eq!(
        model.predict(&SparseVector::from_dense(&[0.5])),
        2.0,
        epsilon = 0.05
    );
}

#[test]
fn test_nu_svr_fits_line() {
    let problem = line(20);
    let model = SVM::new(Formulation::NuSvr { c: 10.0, nu: 0.5 })
        .with_kernel(KernelType::Linear)
        .train(&problem)
        .unwrap();

    for (x, &y) in problem.features().iter().zip(problem.labels()) {
        assert_abs_diff_eq!(model.predict(x), y, epsilon = 0.2);
    }
}

#[test]
fn test_multiclass_one_vs_one() {
    let problem = three_classes();
    let model = SVM::new(Formulation::CSvc { c: 5.0 })
        .with_kernel(KernelType::Rbf { gamma: 0.5 })
        .train(&problem)
        .unwrap();

    assert_eq!(model.nr_class(), 3);
    assert_eq!(model.labels(), &[5, 7, 9]);
    assert_eq!(model.sv_coef().len(), 3);
    assert_eq!(model.predict_values(&problem.features()[0]).len(), 3);
    assert_eq!(evaluate_classification(&model, &problem).accuracy(), 1.0);
    assert_eq!(model.predict(&SparseVector::from_dense(&[0.0, 3.0])), 5.0);
    assert_eq!(model.predict(&SparseVector::from_dense(&[3.0, -2.0])), 7.0);
    assert_eq!(model.predict(&SparseVector::from_dense(&[-3.0, -2.0])), 9.0);
}

/// Every training multiplier satisfies the KKT conditions within tolerance
#[test]
fn test_kkt_conditions_hold() {
    let problem = two_blobs(25, 0.6);
    let c = 1.0;
    let model = SVM::new(Formulation::CSvc { c })
        .with_kernel(KernelType::Linear)
        .with_epsilon(1e-4)
        .train(&problem)
        .unwrap();

    let mut alpha_y = vec![0.0; problem.len()];
    for (&idx, &coef) in model.sv_indices().iter().zip(&model.sv_coef()[0]) {
        alpha_y[idx] = coef;
    }
    assert_abs_diff_eq!(alpha_y.iter().sum::<f64>(), 0.0, epsilon = 1e-9);

    let tol = 1e-2;
    for (i, (x, &y)) in problem.features().iter().zip(problem.labels()).enumerate() {
        let alpha = alpha_y[i] * y;
        assert!((0.0..=c + 1e-12).contains(&alpha));

        let margin = y * model.predict_values(x)[0];
        if alpha == 0.0 {
            assert!(margin >= 1.0 - tol, "sample {}: margin {}", i, margin);
        } else if alpha >= c {
            assert!(margin <= 1.0 + tol, "sample {}: margin {}", i, margin);
        } else {
            assert_abs_diff_eq!(margin, 1.0, epsilon = tol);
        }
    }
}

#[test]
fn test_training_is_deterministic() {
    let problem = three_classes();
    let svm = SVM::new(Formulation::CSvc { c: 2.0 }).with_kernel(KernelType::Rbf { gamma: 0.3 });
    assert_eq!(svm.train(&problem).unwrap(), svm.train(&problem).unwrap());
}

#[test]
fn test_cache_budget_does_not_change_model() {
    let problem = two_blobs(40, 0.8);
    let train = |megabytes: f64| {
        SVM::new(Formulation::CSvc { c: 1.0 })
            .with_kernel(KernelType::Rbf { gamma: 0.5 })
            .with_cache_size(megabytes)
            .train(&problem)
            .unwrap()
    };
    assert_eq!(train(1e-6), train(1000.0));
}

#[test]
fn test_shrinking_reaches_same_predictions() {
    let problem = two_blobs(40, 0.8);
    let train = |shrinking: bool| {
        SVM::new(Formulation::CSvc { c: 1.0 })
            .with_kernel(KernelType::Linear)
            .with_shrinking(shrinking)
            .train(&problem)
            .unwrap()
    };
    let (with, without) = (train(true), train(false));
    for x in problem.features() {
        assert_abs_diff_eq!(
            with.predict_values(x)[0],
            without.predict_values(x)[0],
            epsilon = 0.05
        );
    }
}

fn bits(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

#[test]
fn test_model_file_round_trip_predicts_identically() {
    let sigmoid = KernelType::Sigmoid {
        gamma: 0.1,
        coef0: 0.0,
    };
    let rbf = KernelType::Rbf { gamma: 0.5 };
    // (formulation, kernel, training data, calibrate)
    let cases = vec![
        (Formulation::CSvc { c: 2.0 }, rbf, three_classes(), true),
        (Formulation::NuSvc { nu: 0.2 }, sigmoid, three_classes(), true),
        (Formulation::OneClass { nu: 0.3 }, rbf, two_blobs(10, 2.0), false),
        (Formulation::EpsilonSvr { c: 10.0, p: 0.05 }, rbf, line(15), true),
        (Formulation::NuSvr { c: 10.0, nu: 0.4 }, KernelType::Linear, line(15), true),
    ];

    for (formulation, kernel, problem, calibrate) in cases {
        let name = formulation.name();
        let model = SVM::new(formulation)
            .with_kernel(kernel)
            .with_probability(calibrate)
            .train(&problem)
            .unwrap_or_else(|e| panic!("{}: {}", name, e));
        assert_eq!(model.has_probability_model(), calibrate, "{}", name);

        let file = NamedTempFile::new().unwrap();
        save_model(&model, problem.len(), 2, file.path()).unwrap();
        let loaded = load_model(file.path()).unwrap();
        assert_eq!(loaded, model, "{}", name);

        for x in problem.features() {
            assert_eq!(
                bits(&model.predict_values(x)),
                bits(&loaded.predict_values(x)),
                "{}",
                name
            );
            assert_eq!(model.predict(x).to_bits(), loaded.predict(x).to_bits(), "{}", name);
            if calibrate {
                let (label_a, probs_a) = model.predict_probability(x).unwrap();
                let (label_b, probs_b) = loaded.predict_probability(x).unwrap();
                assert_eq!(label_a.to_bits(), label_b.to_bits(), "{}", name);
                assert_eq!(bits(&probs_a), bits(&probs_b), "{}", name);
            }
        }
    }
}

#[test]
fn test_vote_tie_goes_to_first_label() {
    // zero coefficients: every decision value is -rho
    let params = SvmParams::new(Formulation::CSvc { c: 1.0 }, KernelType::Linear);
    let model = SvmModel::from_parts(ModelParts {
        params,
        nr_class: 3,
        labels: vec![1, 2, 3],
        n_sv: vec![1, 1, 1],
        support_vectors: vec![SparseVector::from_dense(&[1.0]); 3],
        sv_coef: vec![vec![0.0; 3]; 3],
        // 1 beats 2, 3 beats 1, 2 beats 3
        rho: vec![-1.0, 1.0, -1.0],
        sv_indices: vec![0, 1, 2],
        calibration: None,
    })
    .unwrap();

    assert_eq!(model.predict(&SparseVector::from_dense(&[2.0])), 1.0);
}

#[test]
fn test_binary_probability_is_monotone() {
    let problem = two_blobs(20, 1.5);
    let model = SVM::new(Formulation::CSvc { c: 1.0 })
        .with_kernel(KernelType::Linear)
        .with_probability(true)
        .train(&problem)
        .unwrap();
    assert!(model.has_probability_model());

    let positive = model.labels().iter().position(|&l| l == 1).unwrap();
    let prob_at = |t: f64| {
        let (_, probs) = model
            .predict_probability(&SparseVector::from_dense(&[t, t]))
            .unwrap();
        assert_eq!(probs.len(), 2);
        assert_abs_diff_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        probs[positive]
    };

    let samples: Vec<f64> = [-4.0, -2.0, -0.5, 0.0, 0.5, 2.0, 4.0]
        .iter()
        .map(|&t| prob_at(t))
        .collect();
    for pair in samples.windows(2) {
        assert!(pair[0] <= pair[1], "probabilities not monotone: {:?}", samples);
    }
    assert!(samples[6] > 0.5 && samples[0] < 0.5);
}

#[test]
fn test_multiclass_probabilities_sum_to_one() {
    let problem = three_classes();
    let model = SVM::new(Formulation::CSvc { c: 5.0 })
        .with_kernel(KernelType::Rbf { gamma: 0.5 })
        .with_probability(true)
        .train(&problem)
        .unwrap();

    let (label, probs) = model
        .predict_probability(&SparseVector::from_dense(&[0.0, 3.0]))
        .unwrap();
    assert_eq!(probs.len(), 3);
    assert_abs_diff_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    assert_eq!(label, 5.0);
}

#[test]
fn test_regression_probability_scale() {
    let x: Vec<SparseVector> = (0..40)
        .map(|i| SparseVector::from_dense(&[i as f64 / 40.0]))
        .collect();
    let y: Vec<f64> = (0..40)
        .map(|i| i as f64 / 40.0 + if i % 3 == 0 { 0.1 } else { -0.05 })
        .collect();
    let problem = Problem::new(x, y).unwrap();

    let model = SVM::new(Formulation::EpsilonSvr { c: 10.0, p: 0.01 })
        .with_kernel(KernelType::Linear)
        .with_probability(true)
        .train(&problem)
        .unwrap();

    let sigma = model.svr_probability().expect("Laplace scale should be fitted");
    assert!(sigma > 0.0 && sigma < 1.0);

    let x = SparseVector::from_dense(&[0.5]);
    let (value, probs) = model.predict_probability(&x).unwrap();
    assert!(probs.is_empty());
    assert_eq!(value, model.predict(&x));
}

#[test]
fn test_probability_unavailable_without_calibration() {
    let problem = two_blobs(5, 2.0);
    let model = SVM::default().train(&problem).unwrap();
    assert!(matches!(
        model.predict_probability(&problem.features()[0]),
        Err(SVMError::ProbabilityUnavailable(_))
    ));
}

#[test]
fn test_cross_validation_covers_every_sample() {
    let problem = two_blobs(15, 3.0);
    let svm = SVM::new(Formulation::CSvc { c: 1.0 })
        .with_kernel(KernelType::Linear)
        .with_seed(7);

    let predicted = svm.cross_validate(&problem, 5).unwrap();
    assert_eq!(predicted.len(), problem.len());
    assert_eq!(predicted, problem.labels());
    assert_eq!(predicted, svm.cross_validate(&problem, 5).unwrap());
}

#[test]
fn test_regression_cross_validation() {
    let problem = line(25);
    let predicted = SVM::new(Formulation::EpsilonSvr { c: 100.0, p: 0.01 })
        .with_kernel(KernelType::Linear)
        .cross_validate(&problem, 5)
        .unwrap();
    for (p, y) in predicted.iter().zip(problem.labels()) {
        assert_abs_diff_eq!(p, y, epsilon = 0.1);
    }
}

#[test]
fn test_single_sample_degrades_gracefully() {
    let problem = Problem::new(vec![SparseVector::from_dense(&[1.0, 2.0])], vec![3.0]).unwrap();

    for formulation in [
        Formulation::CSvc { c: 1.0 },
        Formulation::NuSvc { nu: 0.5 },
        Formulation::OneClass { nu: 0.5 },
        Formulation::EpsilonSvr { c: 1.0, p: 0.1 },
        Formulation::NuSvr { c: 1.0, nu: 0.5 },
    ] {
        let predicted = SVM::new(formulation)
            .with_kernel(KernelType::Linear)
            .cross_validate(&problem, 5)
            .unwrap();
        assert_eq!(predicted.len(), 1);
        assert!(predicted[0].is_finite(), "{}", formulation.name());
    }

    let model = SVM::new(Formulation::EpsilonSvr { c: 1.0, p: 0.1 })
        .with_kernel(KernelType::Linear)
        .with_probability(true)
        .train(&problem)
        .unwrap();
    let sigma = model.svr_probability().unwrap();
    assert!(sigma.is_finite() && sigma >= 0.0);
    assert!(model.predict(&problem.features()[0]).is_finite());
}

#[test]
fn test_precomputed_kernel_matches_linear() {
    let problem = two_blobs(10, 1.0);
    let features = problem.features();
    let dot = |a: &SparseVector, b: &SparseVector| smosvm::kernel::dot_product_sparse(a, b);

    let gram_row = |id: usize, x: &SparseVector| {
        let mut indices = vec![0];
        let mut values = vec![id as f64];
        for (j, xj) in features.iter().enumerate() {
            indices.push(j + 1);
            values.push(dot(x, xj));
        }
        SparseVector::new(indices, values)
    };

    let rows: Vec<SparseVector> = features
        .iter()
        .enumerate()
        .map(|(i, x)| gram_row(i + 1, x))
        .collect();
    let precomputed = Problem::new(rows, problem.labels().to_vec()).unwrap();

    let svm = SVM::new(Formulation::CSvc { c: 1.0 });
    let linear = svm.clone().with_kernel(KernelType::Linear).train(&problem).unwrap();
    let pre = svm.with_kernel(KernelType::Precomputed).train(&precomputed).unwrap();

    assert_eq!(linear.sv_indices(), pre.sv_indices());
    assert_abs_diff_eq!(linear.rho()[0], pre.rho()[0], epsilon = 1e-12);

    let query = SparseVector::from_dense(&[0.3, -0.2]);
    assert_abs_diff_eq!(
        linear.predict_values(&query)[0],
        pre.predict_values(&gram_row(0, &query))[0],
        epsilon = 1e-9
    );
}

#[test]
fn test_class_weights_scale_bounds() {
    let problem = two_blobs(20, 0.3);
    let c = 0.5;
    let model = SVM::new(Formulation::CSvc { c })
        .with_kernel(KernelType::Linear)
        .with_class_weight(1, 4.0)
        .train(&problem)
        .unwrap();

    let n_pos = model.n_sv()[0];
    for (k, &coef) in model.sv_coef()[0].iter().enumerate() {
        let bound = if k < n_pos { c * 4.0 } else { c };
        assert!(coef.abs() <= bound + 1e-12);
    }
}

#[test]
fn test_invalid_parameters_are_rejected() {
    let problem = two_blobs(5, 2.0);
    let cases = [
        SVM::new(Formulation::CSvc { c: 0.0 }),
        SVM::new(Formulation::NuSvc { nu: 1.5 }),
        SVM::new(Formulation::OneClass { nu: 0.5 }).with_probability(true),
        SVM::default().with_epsilon(-1.0),
        SVM::default().with_cache_size(0.0),
        SVM::default().with_kernel(KernelType::Rbf { gamma: -1.0 }),
        SVM::default().with_class_weight(1, 0.0),
    ];
    for svm in cases {
        assert!(matches!(
            svm.train(&problem),
            Err(SVMError::InvalidParameter(_))
        ));
    }
}

#[test]
fn test_infeasible_nu_is_rejected() {
    // 2 positives, 8 negatives: nu * 10 / 2 must not exceed 2
    let x = (0..10).map(|i| SparseVector::from_dense(&[i as f64])).collect();
    let y = (0..10).map(|i| if i < 2 { 1.0 } else { -1.0 }).collect();
    let problem = Problem::new(x, y).unwrap();
    assert!(matches!(
        SVM::new(Formulation::NuSvc { nu: 0.9 }).train(&problem),
        Err(SVMError::InvalidParameter(_))
    ));
}

#[test]
fn test_iteration_ceiling_still_returns_model() {
    let problem = two_blobs(30, 0.5);
    let model = SVM::new(Formulation::CSvc { c: 10.0 })
        .with_kernel(KernelType::Linear)
        .with_max_iterations(2)
        .train(&problem)
        .expect("hitting the ceiling is a warning, not an error");
    assert_eq!(model.nr_class(), 2);
}

#[test]
fn test_cancelled_training_returns_error() {
    let token = CancelToken::new();
    token.cancel();
    let result = SVM::default()
        .with_cancel_token(token)
        .train(&two_blobs(10, 1.0));
    assert!(matches!(result, Err(SVMError::Cancelled)));
}
