//! # Train Results
//!
//! The model's train builder returns either a bare loss or a loss with
//! auxiliary outputs. Anything else is a contract violation.

use super::MamlError;
use crate::tensor::Tensor;

#[derive(Debug, Clone)]
pub enum TrainOutput<A> {
    Loss(Tensor),
    LossWithAux(Tensor, A),
}

impl<A> TrainOutput<A> {
    pub fn loss(&self) -> &Tensor {
        match self {
            TrainOutput::Loss(loss) | TrainOutput::LossWithAux(loss, _) => loss,
        }
    }

    pub fn aux(&self) -> Option<&A> {
        match self {
            TrainOutput::Loss(_) => None,
            TrainOutput::LossWithAux(_, aux) => Some(aux),
        }
    }

    pub fn into_parts(self) -> (Tensor, Option<A>) {
        match self {
            TrainOutput::Loss(loss) => (loss, None),
            TrainOutput::LossWithAux(loss, aux) => (loss, Some(aux)),
        }
    }
}

/// Pulls the scalar loss out of a train result. The returned tensor is the
/// same graph node, not a copy.
pub fn extract_train_loss<A>(result: &TrainOutput<A>) -> Result<Tensor, MamlError> {
    let loss = result.loss();
    if !loss.is_scalar() {
        return Err(MamlError::UnrecognizedTrainResult {
            shape: loss.shape().to_vec(),
        });
    }
    Ok(loss.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::full;

    #[test]
    fn bare_loss_is_returned_as_is() {
        let loss = Tensor::scalar(1.5, true);
        let extracted = extract_train_loss(&TrainOutput::<()>::Loss(loss.clone())).unwrap();
        assert!(extracted.same_node(&loss));
    }

    #[test]
    fn aux_outputs_are_ignored() {
        let loss = Tensor::scalar(0.25, true);
        let result = TrainOutput::LossWithAux(loss.clone(), vec!["accuracy", "logits"]);
        assert!(extract_train_loss(&result).unwrap().same_node(&loss));
        assert_eq!(result.aux().map(Vec::len), Some(2));
    }

    #[test]
    fn non_scalar_loss_is_rejected() {
        let result = TrainOutput::<()>::Loss(full(&[2, 2], 1.0, true));
        assert!(matches!(
            extract_train_loss(&result),
            Err(MamlError::UnrecognizedTrainResult { shape }) if shape == vec![2, 2]
        ));
    }
}
