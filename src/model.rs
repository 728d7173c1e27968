use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use tracing::{info, warn};

use crate::error::{InferenceError, LoadError};
use crate::labels::ClassNames;
use crate::preprocess::{preprocess_image, InputBatch};

/// Canonical operation names of an exported classifier graph.
const INPUT_OP: &str = "x";
const OUTPUT_OP: &str = "Identity";

/// Names older exporters gave to the canonical input and output operations.
const LEGACY_OP_ALIASES: &[(&str, &str)] = &[
    ("input_1", INPUT_OP),
    ("serving_default_input_1", INPUT_OP),
    ("keras_tensor", INPUT_OP),
    ("StatefulPartitionedCall", OUTPUT_OP),
    ("Identity_1", OUTPUT_OP),
    ("dense/Softmax", OUTPUT_OP),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub prediction: String,
    pub confidence: f64,
}

/// Anything that maps a preprocessed batch to one score per class.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &InputBatch) -> Result<Vec<f32>, InferenceError>;
}

/// Index of the first maximum, ignoring NaN scores.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Full prediction path for one upload: preprocess, infer, pick the top class.
pub fn classify(
    classifier: &dyn Classifier,
    class_names: &ClassNames,
    image_data: &[u8],
    size: (u32, u32),
) -> Result<PredictionResult, InferenceError> {
    let input = preprocess_image(image_data, size)?;
    let scores = classifier.predict(&input)?;
    if let Some(nan_idx) = scores.iter().position(|s| s.is_nan()) {
        return Err(InferenceError::NanScore(nan_idx));
    }
    let idx = argmax(&scores).ok_or(InferenceError::EmptyOutput)?;

    Ok(PredictionResult {
        prediction: class_names.label_for(idx),
        confidence: f64::from(scores[idx]),
    })
}

/// A frozen TensorFlow graph with its input and output operations resolved.
pub struct GraphModel {
    session: Session,
    graph: Graph,
    input_op: String,
    output_op: String,
}

impl Classifier for GraphModel {
    fn predict(&self, input: &InputBatch) -> Result<Vec<f32>, InferenceError> {
        let dims: Vec<u64> = input.shape().iter().map(|&d| d as u64).collect();
        let input_tensor = Tensor::<f32>::new(&dims).with_values(input.data())?;

        let input_operation = self.graph.operation_by_name_required(&self.input_op)?;
        let output_operation = self.graph.operation_by_name_required(&self.output_op)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session.run(&mut args)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token)?;
        Ok(output_tensor.to_vec())
    }
}

/// One way of turning the model artifact into a classifier.
pub trait LoadStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, LoadError>;
}

/// Imports a frozen GraphDef and resolves the canonical operations,
/// optionally through a table of legacy names.
pub struct GraphDefStrategy {
    name: &'static str,
    aliases: &'static [(&'static str, &'static str)],
}

impl GraphDefStrategy {
    pub fn strict() -> Self {
        GraphDefStrategy {
            name: "strict graph",
            aliases: &[],
        }
    }

    pub fn legacy_aliases() -> Self {
        GraphDefStrategy {
            name: "legacy aliases",
            aliases: LEGACY_OP_ALIASES,
        }
    }

    fn resolve_op(&self, graph: &Graph, canonical: &str) -> Result<String, LoadError> {
        let candidates = std::iter::once(canonical).chain(
            self.aliases
                .iter()
                .filter(|(_, target)| *target == canonical)
                .map(|(legacy, _)| *legacy),
        );

        for name in candidates {
            if graph.operation_by_name(name)?.is_some() {
                return Ok(name.to_string());
            }
        }
        Err(LoadError::MissingOperation(canonical.to_string()))
    }
}

impl LoadStrategy for GraphDefStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
        let io_err = |source: std::io::Error| LoadError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut model_bytes = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut model_bytes))
            .map_err(io_err)?;

        let mut graph = Graph::new();
        graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;

        let input_op = self.resolve_op(&graph, INPUT_OP)?;
        let output_op = self.resolve_op(&graph, OUTPUT_OP)?;
        let session = Session::new(&SessionOptions::new(), &graph)?;

        Ok(Arc::new(GraphModel {
            session,
            graph,
            input_op,
            output_op,
        }))
    }
}

/// Load attempts in the order they are tried at startup.
pub fn default_strategies() -> Vec<Box<dyn LoadStrategy>> {
    vec![
        Box::new(GraphDefStrategy::strict()),
        Box::new(GraphDefStrategy::legacy_aliases()),
    ]
}

/// Runs `strategies` in order until one succeeds. When every attempt fails the
/// error messages are joined with `" | "`.
pub fn load_with_fallback(
    path: &Path,
    strategies: &[Box<dyn LoadStrategy>],
) -> Result<Arc<dyn Classifier>, String> {
    let mut failures = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        match strategy.load(path) {
            Ok(classifier) => {
                info!(strategy = strategy.name(), path = %path.display(), "model loaded");
                return Ok(classifier);
            }
            Err(err) => {
                warn!(strategy = strategy.name(), error = %err, "model load attempt failed");
                failures.push(err.to_string());
            }
        }
    }

    if failures.is_empty() {
        failures.push("no load strategies configured".to_string());
    }
    Err(failures.join(" | "))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::preprocess::tests::png_bytes;

    /// Returns fixed scores regardless of input.
    pub(crate) struct FixedScores(pub Vec<f32>);

    impl Classifier for FixedScores {
        fn predict(&self, _input: &InputBatch) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct Failing(&'static str);

    impl LoadStrategy for Failing {
        fn name(&self) -> &str {
            self.0
        }

        fn load(&self, _path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
            Err(LoadError::Backend(format!("{} failed", self.0)))
        }
    }

    struct Succeeding;

    impl LoadStrategy for Succeeding {
        fn name(&self) -> &str {
            "succeeding"
        }

        fn load(&self, _path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
            Ok(Arc::new(FixedScores(vec![0.1, 0.9])))
        }
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4, 0.0]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.3, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn classify_picks_top_label() {
        let names = ClassNames::new(vec!["glass".into(), "metal".into(), "paper".into()]);
        let result = classify(
            &FixedScores(vec![0.1, 0.7, 0.2]),
            &names,
            &png_bytes(20, 20),
            (8, 8),
        )
        .unwrap();

        assert_eq!(result.prediction, "metal");
        assert!((result.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn classify_synthesizes_label_past_class_list() {
        let names = ClassNames::new(vec!["glass".into()]);
        let result = classify(
            &FixedScores(vec![0.0, 0.1, 0.0, 0.05, 0.0, 0.85]),
            &names,
            &png_bytes(20, 20),
            (8, 8),
        )
        .unwrap();

        assert_eq!(result.prediction, "class_5");
    }

    #[test]
    fn classify_rejects_empty_output() {
        let err = classify(
            &FixedScores(vec![]),
            &ClassNames::placeholder(),
            &png_bytes(20, 20),
            (8, 8),
        )
        .unwrap_err();
        assert!(matches!(err, InferenceError::EmptyOutput));
    }

    #[test]
    fn classify_fails_on_nan_score() {
        let err = classify(
            &FixedScores(vec![f32::NAN, 0.3]),
            &ClassNames::placeholder(),
            &png_bytes(20, 20),
            (8, 8),
        )
        .unwrap_err();
        assert!(matches!(err, InferenceError::NanScore(0)));
    }

    #[test]
    fn fallback_used_after_primary_failure() {
        let strategies: Vec<Box<dyn LoadStrategy>> =
            vec![Box::new(Failing("primary")), Box::new(Succeeding)];
        assert!(load_with_fallback(Path::new("unused"), &strategies).is_ok());
    }

    #[test]
    fn all_failures_are_joined() {
        let strategies: Vec<Box<dyn LoadStrategy>> =
            vec![Box::new(Failing("primary")), Box::new(Failing("legacy"))];
        let err = load_with_fallback(Path::new("unused"), &strategies)
            .err()
            .unwrap();
        assert_eq!(err, "tensorflow: primary failed | tensorflow: legacy failed");
    }

    #[test]
    fn missing_artifact_degrades_both_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_with_fallback(&dir.path().join("frozen_graph.pb"), &default_strategies())
            .err()
            .unwrap();
        assert_eq!(err.matches("failed to read model file").count(), 2);
        assert!(err.contains(" | "));
    }
}
