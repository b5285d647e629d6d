use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d};
use burn::tensor::activation::relu;
use burn::tensor::{Tensor, backend::Backend};
use serde::{Deserialize, Serialize};

pub(crate) const KERNEL_SIZE: usize = 5;
pub(crate) const POOL_SIZE: usize = 8;
const WIDE_FILTERS: usize = 256;
const FILTERS: usize = 128;

/// Hyper-parameters that fix the network's shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionCnnConfig {
    pub input_width: usize,
    pub num_classes: usize,
    pub dropout: f64,
}

impl EmotionCnnConfig {
    /// Sequence length after the single pooling stage.
    pub fn pooled_width(&self) -> usize {
        if self.input_width < POOL_SIZE {
            return 0;
        }
        (self.input_width - POOL_SIZE) / POOL_SIZE + 1
    }

    pub fn flattened_width(&self) -> usize {
        FILTERS * self.pooled_width()
    }

    /// Named parameter shapes of the network this config builds.
    pub fn parameter_shapes(&self) -> Vec<ParamShape> {
        let mut shapes = Vec::new();
        let convs = [
            ("conv1", WIDE_FILTERS, 1),
            ("conv2", FILTERS, WIDE_FILTERS),
            ("conv3", FILTERS, FILTERS),
            ("conv4", FILTERS, FILTERS),
        ];
        for (name, out_channels, in_channels) in convs {
            shapes.push(ParamShape::new(
                format!("{name}.weight"),
                vec![out_channels, in_channels, KERNEL_SIZE],
            ));
            shapes.push(ParamShape::new(format!("{name}.bias"), vec![out_channels]));
        }
        shapes.push(ParamShape::new(
            "output.weight",
            vec![self.flattened_width(), self.num_classes],
        ));
        shapes.push(ParamShape::new("output.bias", vec![self.num_classes]));
        shapes
    }

    /// Ordered layer descriptors, used for the persisted topology.
    pub fn layers(&self) -> Vec<LayerSpec> {
        let conv = |filters| LayerSpec::Conv1d {
            filters,
            kernel_size: KERNEL_SIZE,
            padding: "same".to_string(),
        };
        vec![
            conv(WIDE_FILTERS),
            LayerSpec::Relu,
            conv(FILTERS),
            LayerSpec::Relu,
            LayerSpec::Dropout { rate: self.dropout },
            LayerSpec::MaxPool1d {
                pool_size: POOL_SIZE,
                stride: POOL_SIZE,
            },
            conv(FILTERS),
            LayerSpec::Relu,
            conv(FILTERS),
            LayerSpec::Relu,
            LayerSpec::Flatten,
            LayerSpec::Dense {
                units: self.num_classes,
            },
            LayerSpec::Softmax,
        ]
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> EmotionCnn<B> {
        let conv = |in_channels, out_channels| {
            Conv1dConfig::new(in_channels, out_channels, KERNEL_SIZE)
                .with_padding(PaddingConfig1d::Same)
                .init(device)
        };
        EmotionCnn {
            conv1: conv(1, WIDE_FILTERS),
            conv2: conv(WIDE_FILTERS, FILTERS),
            dropout: DropoutConfig::new(self.dropout).init(),
            pool: MaxPool1dConfig::new(POOL_SIZE)
                .with_stride(POOL_SIZE)
                .init(),
            conv3: conv(FILTERS, FILTERS),
            conv4: conv(FILTERS, FILTERS),
            output: LinearConfig::new(self.flattened_width(), self.num_classes).init(device),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamShape {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParamShape {
    fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv1d {
        filters: usize,
        kernel_size: usize,
        padding: String,
    },
    Relu,
    Dropout {
        rate: f64,
    },
    MaxPool1d {
        pool_size: usize,
        stride: usize,
    },
    Flatten,
    Dense {
        units: usize,
    },
    Softmax,
}

/// 1-D convolutional emotion classifier over a `[batch, 1, width]` feature row.
#[derive(Module, Debug)]
pub struct EmotionCnn<B: Backend> {
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    dropout: Dropout,
    pool: MaxPool1d,
    conv3: Conv1d<B>,
    conv4: Conv1d<B>,
    output: Linear<B>,
}

impl<B: Backend> EmotionCnn<B> {
    /// Class logits; softmax is applied by the loss and by prediction.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(input));
        let x = relu(self.conv2.forward(x));
        let x = self.dropout.forward(x);
        let x = self.pool.forward(x);
        let x = relu(self.conv3.forward(x));
        let x = relu(self.conv4.forward(x));
        let x: Tensor<B, 2> = x.flatten(1, 2);
        self.output.forward(x)
    }

    /// Shapes of the parameters actually held by this instance.
    pub fn parameter_shapes(&self) -> Vec<ParamShape> {
        let mut shapes = Vec::new();
        for (name, conv) in [
            ("conv1", &self.conv1),
            ("conv2", &self.conv2),
            ("conv3", &self.conv3),
            ("conv4", &self.conv4),
        ] {
            shapes.push(ParamShape::new(
                format!("{name}.weight"),
                conv.weight.val().dims().to_vec(),
            ));
            if let Some(bias) = &conv.bias {
                shapes.push(ParamShape::new(
                    format!("{name}.bias"),
                    bias.val().dims().to_vec(),
                ));
            }
        }
        shapes.push(ParamShape::new(
            "output.weight",
            self.output.weight.val().dims().to_vec(),
        ));
        if let Some(bias) = &self.output.bias {
            shapes.push(ParamShape::new("output.bias", bias.val().dims().to_vec()));
        }
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    fn config() -> EmotionCnnConfig {
        EmotionCnnConfig {
            input_width: 65,
            num_classes: 7,
            dropout: 0.1,
        }
    }

    #[test]
    fn pooling_65_columns_leaves_8_steps() {
        assert_eq!(config().pooled_width(), 8);
        assert_eq!(config().flattened_width(), 1024);
    }

    #[test]
    fn forward_yields_one_logit_per_class() {
        let device = Default::default();
        let model = config().init::<NdArray>(&device);
        let input = Tensor::<NdArray, 3>::from_data(
            TensorData::new(vec![0.5_f32; 3 * 65], [3, 1, 65]),
            &device,
        );
        assert_eq!(model.forward(input).dims(), [3, 7]);
    }

    #[test]
    fn built_shapes_match_declared_shapes() {
        let device = Default::default();
        let model = config().init::<NdArray>(&device);
        assert_eq!(model.parameter_shapes(), config().parameter_shapes());
    }

    #[test]
    fn layer_descriptors_serialize_with_kind_tags() {
        let json = serde_json::to_string(&config().layers()).unwrap();
        assert!(json.starts_with(r#"[{"kind":"conv1d","filters":256"#));
        assert!(json.contains(r#"{"kind":"max_pool1d","pool_size":8,"stride":8}"#));
        assert!(json.ends_with(r#"{"kind":"softmax"}]"#));
    }
}
