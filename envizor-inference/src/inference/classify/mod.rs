mod inference_resnet_cls;

pub use inference_resnet_cls::{
    ClassifierOutput, ClassifierProfile, ClassifyInference, ClassifyResult, InputScaling,
    ResNetClassifySession,
};
