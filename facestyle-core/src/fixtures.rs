//! Tiny ONNX graphs written to disk for loader tests.

use std::path::{Path, PathBuf};

use prost::Message;
use tract_onnx::pb::{
    self, tensor_proto::DataType, tensor_shape_proto::dimension, type_proto,
};

/// One axis of a declared graph input or output.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Dim {
    Fixed(i64),
    Named(&'static str),
}

/// `[1, 3, side, side]`
pub(crate) fn nchw(side: i64) -> [Dim; 4] {
    [Dim::Fixed(1), Dim::Fixed(3), Dim::Fixed(side), Dim::Fixed(side)]
}

fn value_info(name: &str, dims: &[Dim]) -> pb::ValueInfoProto {
    let dim = dims
        .iter()
        .map(|d| pb::tensor_shape_proto::Dimension {
            value: Some(match *d {
                Dim::Fixed(v) => dimension::Value::DimValue(v),
                Dim::Named(n) => dimension::Value::DimParam(n.to_string()),
            }),
            ..Default::default()
        })
        .collect();
    pb::ValueInfoProto {
        name: name.to_string(),
        r#type: Some(pb::TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: DataType::Float as i32,
                shape: Some(pb::TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Write a one-node `Relu` graph to `dir/name` and return its path.
pub(crate) fn write_relu_graph(dir: &Path, name: &str, input: &[Dim], output: &[Dim]) -> PathBuf {
    let graph = pb::GraphProto {
        name: "relu".into(),
        node: vec![pb::NodeProto {
            input: vec!["x".into()],
            output: vec!["y".into()],
            op_type: "Relu".into(),
            ..Default::default()
        }],
        input: vec![value_info("x", input)],
        output: vec![value_info("y", output)],
        ..Default::default()
    };
    let model = pb::ModelProto {
        ir_version: 7,
        opset_import: vec![pb::OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
        graph: Some(graph),
        ..Default::default()
    };

    let path = dir.join(name);
    std::fs::write(&path, model.encode_to_vec()).expect("write onnx fixture");
    path
}
