use std::path::Path;
use std::sync::Mutex;

use tch::{CModule, Device, Kind, Tensor};

use super::classifier::{Classifier, ClassifierError, ClassifierLoader};
use crate::preprocess::NormalizedTensor;

/// Loads TorchScript exports of the action network.
#[derive(Debug, Clone)]
pub struct TorchLoader {
    device: Device,
    apply_softmax: bool,
}

impl TorchLoader {
    pub fn new(apply_softmax: bool) -> Self {
        Self {
            device: Device::cuda_if_available(),
            apply_softmax,
        }
    }
}

impl ClassifierLoader for TorchLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Classifier>, ClassifierError> {
        let module = CModule::load_on_device(path, self.device)
            .map_err(|e| ClassifierError::Backend(e.to_string()))?;
        log::info!("TorchScript module loaded on {:?}", self.device);
        Ok(Box::new(TorchClassifier {
            module: Mutex::new(module),
            device: self.device,
            apply_softmax: self.apply_softmax,
        }))
    }
}

pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
    apply_softmax: bool,
}

impl Classifier for TorchClassifier {
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        let values = input
            .as_slice()
            .ok_or_else(|| ClassifierError::Input("tensor is not contiguous".to_string()))?;
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let tensor = Tensor::from_slice(values)
            .view(shape.as_slice())
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| ClassifierError::Backend("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_ts(&[tensor]))
            .map_err(|e| ClassifierError::Backend(e.to_string()))?;
        let output = if self.apply_softmax {
            output.softmax(-1, Kind::Float)
        } else {
            output
        };

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
