//! Integration tests for the ML4F transformer

use ml4f_transformer::model::{scaled_dot_product_attention, PositionalEncoding};
use ml4f_transformer::prelude::*;
use ndarray::{Array3, Array4};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("ml4f_transformer=debug")
        .try_init();
}

fn random_inputs(config: &TransformerConfig, batch: usize, seed: u64) -> (Array3<f64>, Array3<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array3::random_using(
        (batch, config.context_window, config.d_model_e),
        StandardNormal,
        &mut rng,
    );
    let y = Array3::random_using(
        (batch, config.pred_window, config.d_model_d),
        StandardNormal,
        &mut rng,
    );
    (x, y)
}

#[test]
fn test_reference_scenario_end_to_end() -> anyhow::Result<()> {
    init_tracing();

    let config = TransformerConfig::default()
        .with_experiment(Experiment::Return)
        .with_widths(5, 1)
        .with_heads(4)
        .with_layers(4)
        .with_dropout(0.1)
        .with_windows(15, 5, 15);
    config.validate()?;

    let mask = build_causal_mask(5, 5);
    let model = Ml4fTransformer::new(config.clone(), mask);

    let (x, y) = random_inputs(&config, 4, 0);
    let prediction = model.forward(&x, &y)?;

    assert_eq!(prediction.shape(), &[4, 5]);
    assert!(prediction.iter().all(|v| v.is_finite() && *v >= 0.0));
    Ok(())
}

#[test]
fn test_output_shape_is_invariant() -> anyhow::Result<()> {
    let cases = [
        // (d_model_e, d_model_d, heads, n_layers)
        (5, 1, 4, 4),
        (3, 1, 1, 1),
        (8, 2, 2, 3),
        (1, 4, 3, 2),
    ];

    for (i, &(d_e, d_d, heads, n)) in cases.iter().enumerate() {
        let config = TransformerConfig::default()
            .with_widths(d_e, d_d)
            .with_heads(heads)
            .with_layers(n)
            .with_windows(12, 4, 12);
        let mask = build_causal_mask(config.pred_window, config.pred_window);
        let model =
            Ml4fTransformer::with_rng(config.clone(), mask, &mut StdRng::seed_from_u64(i as u64));

        let (x, y) = random_inputs(&config, 3, 100 + i as u64);
        let prediction = model.forward(&x, &y)?;
        assert_eq!(prediction.shape(), &[3, 4], "case {:?}", cases[i]);
    }
    Ok(())
}

#[test]
fn test_probability_experiment_bounds() -> anyhow::Result<()> {
    let config = TransformerConfig::default()
        .with_experiment("direction".parse()?)
        .with_widths(6, 3)
        .with_layers(2);
    let mask = build_causal_mask(config.pred_window, config.pred_window);
    let model = Ml4fTransformer::with_rng(config.clone(), mask, &mut StdRng::seed_from_u64(1));

    for seed in 0..5 {
        let (x, y) = random_inputs(&config, 8, seed);
        let prediction = model.forward(&x, &y)?;
        assert!(prediction.iter().all(|&v| v > 0.0 && v < 1.0));
    }
    Ok(())
}

#[test]
fn test_config_file_drives_model() -> anyhow::Result<()> {
    let config = TransformerConfig::small().with_widths(4, 1);
    let file = tempfile::NamedTempFile::new()?;
    config.to_json_file(file.path())?;

    let loaded = TransformerConfig::from_json_file(file.path())?;
    assert_eq!(loaded, config);

    let mask = build_causal_mask(loaded.pred_window, loaded.pred_window);
    let model = Ml4fTransformer::new(loaded.clone(), mask);
    let (x, y) = random_inputs(&loaded, 2, 7);
    assert_eq!(model.forward(&x, &y)?.shape(), &[2, loaded.pred_window]);
    Ok(())
}

#[test]
fn test_mask_mismatch_surfaces_on_forward() {
    let config = TransformerConfig::default();
    let model = Ml4fTransformer::new(config.clone(), build_causal_mask(6, 6));

    let (x, y) = random_inputs(&config, 2, 3);
    match model.forward(&x, &y) {
        Err(TransformerError::ShapeMismatch { .. }) => {}
        other => panic!("expected shape mismatch, got {:?}", other),
    }
}

#[test]
fn test_positional_encoding_fixed_point() {
    let pe = PositionalEncoding::new(15, 5);
    let out = pe.forward(&Array3::zeros((1, 9, 5))).unwrap();

    for l in 0..9 {
        for d in 0..5 {
            assert_eq!(out[[0, l, d]], pe.table()[[0, l, d]]);
        }
    }
}

#[test]
fn test_attention_core_rejects_mismatched_heads() {
    let k = Array4::<f64>::zeros((1, 3, 2, 4));
    let q = Array4::<f64>::zeros((1, 3, 3, 4));
    let v = Array4::<f64>::zeros((1, 3, 2, 4));
    assert!(scaled_dot_product_attention(&k, &q, &v, None).is_err());
}
