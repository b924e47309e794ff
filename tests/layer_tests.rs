use ndarray::{array, Array2};
use neurite::{
    Activation, ActivationLayer, ConvolutionalLayer, DenseLayer, HasWeights, Layer, NetError,
    Size, Tensor, TrainingRun,
};

fn almost_equal(a: &Array2<f32>, b: &Array2<f32>, tolerance: f32) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

fn sigmoid(x: f32) -> f32 {
    Activation::Sigmoid.apply(x)
}

#[test]
fn test_dense_feed_forward() {
    let layer = Layer::Dense(DenseLayer::from_lengths(3, 2));
    layer.weights().unwrap().set_weights(array![
        [0.61, 0.82, 0.96, -1.0],
        [0.02, -0.5, 0.23, 0.17]
    ]);

    let output = layer
        .feed_forwards(&Tensor::from_vector(vec![0.57, 0.65, 0.55]))
        .unwrap();

    let expected = [
        0.61 + 0.82 * 0.57 + 0.96 * 0.65 - 1.0 * 0.55,
        0.02 - 0.5 * 0.57 + 0.23 * 0.65 + 0.17 * 0.55,
    ];
    assert_eq!(output.value().len(), 2);
    for (actual, expected) in output.value().iter().zip(expected) {
        assert!((actual - expected).abs() < 0.01, "{actual} vs {expected}");
    }
}

#[test]
fn test_dense_back_propagate() {
    let layer = Layer::Dense(DenseLayer::from_lengths(3, 2));
    layer.weights().unwrap().set_weights(array![
        [0.61, 0.82, 0.96, -1.0],
        [0.02, -0.5, 0.23, 0.17]
    ]);

    let input = Tensor::from_vector(vec![0.57, 0.65, 0.55]);
    let mut run = TrainingRun::new(1);
    run.set_input(input.clone());
    run.set_output(layer.feed_forwards(&input).unwrap());
    run.set_output_error(Tensor::from_vector(vec![0.25, -0.68]));

    layer.back_propagate(&mut run).unwrap();

    let input_error = run.input_error().unwrap();
    assert_eq!(input_error.size(), input.size());

    let expected = [
        0.82 * 0.25 + -0.5 * -0.68,
        0.96 * 0.25 + 0.23 * -0.68,
        -1.0 * 0.25 + 0.17 * -0.68,
    ];
    for (actual, expected) in input_error.value().iter().zip(expected) {
        assert!((actual - expected).abs() < 0.01, "{actual} vs {expected}");
    }

    // delta rows are the output error scaled by the biased input
    let delta = run.weights_delta().unwrap();
    assert_eq!(delta.dim(), (2, 4));
    assert!((delta[[0, 0]] - 0.25).abs() < 1e-6);
    assert!((delta[[0, 1]] - 0.25 * 0.57).abs() < 1e-6);
    assert!((delta[[1, 3]] - -0.68 * 0.55).abs() < 1e-6);
}

#[test]
fn test_dense_rejects_mismatched_input() {
    let layer = Layer::Dense(DenseLayer::from_lengths(3, 2));
    let result = layer.feed_forwards(&Tensor::from_vector(vec![1.0, 2.0]));
    assert!(matches!(result, Err(NetError::ShapeMismatch(_))));
}

#[test]
fn test_dense_simulates_logic_gates() {
    // canonical single-neuron weight rows, read through a sigmoid
    let cases: [(Array2<f32>, Vec<(Vec<f32>, i32)>); 3] = [
        (
            array![[10.0, -20.0]],
            vec![(vec![0.0], 1), (vec![1.0], 0)],
        ),
        (
            array![[-30.0, 20.0, 20.0]],
            vec![
                (vec![0.0, 0.0], 0),
                (vec![0.0, 1.0], 0),
                (vec![1.0, 0.0], 0),
                (vec![1.0, 1.0], 1),
            ],
        ),
        (
            array![[-10.0, 20.0, 20.0]],
            vec![
                (vec![0.0, 0.0], 0),
                (vec![0.0, 1.0], 1),
                (vec![1.0, 0.0], 1),
                (vec![1.0, 1.0], 1),
            ],
        ),
    ];

    for (weights, rows) in cases {
        let inputs = weights.ncols() - 1;
        let layer = Layer::Dense(DenseLayer::from_lengths(inputs, 1));
        layer.weights().unwrap().set_weights(weights);

        for (input, expected) in rows {
            let activation = layer.feed_forwards(&Tensor::from_vector(input)).unwrap();
            let output = sigmoid(activation.value()[0]).round() as i32;
            assert_eq!(output, expected);
        }
    }
}

#[test]
fn test_activation_layer_forward_and_backward() {
    let layer = Layer::Activation(ActivationLayer::new(Size::new([4]), Activation::Relu));

    let input = Tensor::from_vector(vec![1.0, -2.0, 0.5, -0.5]);
    let output = layer.feed_forwards(&input).unwrap();
    assert_eq!(output.value().to_vec(), vec![1.0, 0.0, 0.5, 0.0]);

    let mut run = TrainingRun::new(1);
    run.set_input(input.clone());
    run.set_output(output);
    run.set_output_error(Tensor::from_vector(vec![0.5, 0.5, 0.5, 0.5]));

    layer.back_propagate(&mut run).unwrap();

    let input_error = run.input_error().unwrap();
    assert_eq!(input_error.size(), input.size());
    assert_eq!(input_error.value().to_vec(), vec![0.5, 0.0, 0.5, 0.0]);
    assert!(run.weights_delta().is_none());
}

fn conv_3x3_to_2x2() -> Layer {
    let layer = ConvolutionalLayer::new(
        Size::new([3, 3]),
        Size::new([2, 2]),
        &[2, 2],
        &[1, 1],
        &[0, 0],
    )
    .unwrap();
    layer.set_weights(array![[0.63, -0.23], [-0.14, 0.41]]);
    Layer::Convolutional(layer)
}

fn conv_input_3x3() -> Tensor {
    Tensor::from_matrix(&array![
        [0.76, -1.34, 2.41],
        [-0.42, 1.76, 0.24],
        [-1.24, 0.43, 0.76]
    ])
}

#[test]
fn test_convolutional_feed_forward() {
    let layer = conv_3x3_to_2x2();

    let output = layer.feed_forwards(&conv_input_3x3()).unwrap();

    let expected = array![[1.5674, -1.5465], [-0.3195, 1.305]];
    assert!(almost_equal(&output.to_matrix().unwrap(), &expected, 0.001));
}

#[test]
fn test_convolutional_back_propagate() {
    let layer = conv_3x3_to_2x2();
    let input = conv_input_3x3();

    let mut run = TrainingRun::new(1);
    run.set_input(input.clone());
    run.set_output(layer.feed_forwards(&input).unwrap());
    run.set_output_error(Tensor::from_matrix(&array![[0.24, 0.78], [-0.31, 0.45]]));

    layer.back_propagate(&mut run).unwrap();

    let expected_delta = array![[0.0594, 1.1206], [1.8499, 0.8183]];
    assert!(almost_equal(run.weights_delta().unwrap(), &expected_delta, 0.001));

    let input_error = run.input_error().unwrap();
    assert_eq!(input_error.size(), input.size());
    let expected_input_error = array![
        [0.1512, 0.4362, -0.1794],
        [-0.2289, 0.344, 0.2163],
        [0.0434, -0.1901, 0.1845]
    ];
    assert!(almost_equal(
        &input_error.to_matrix().unwrap(),
        &expected_input_error,
        0.001
    ));
}

#[test]
fn test_convolutional_feed_forward_with_multiple_kernels() {
    let layer = ConvolutionalLayer::new(
        Size::with_kernels([3, 3], 2),
        Size::with_kernels([2, 2], 4),
        &[2, 2],
        &[1, 1],
        &[0, 0],
    )
    .unwrap();
    layer.set_weights(array![
        [0.63, -0.23, 0.63, -0.23, 0.63, -0.23, 0.63, -0.23],
        [-0.14, 0.41, -0.14, 0.41, -0.14, 0.41, -0.14, 0.41]
    ]);
    let layer = Layer::Convolutional(layer);

    let input = Tensor::new(
        Size::with_kernels([3, 3], 2),
        vec![
            0.76, -0.42, -1.24, -1.34, 1.76, 0.43, 2.41, 0.24, 0.76, //
            0.76, -0.42, -1.24, -1.34, 1.76, 0.43, 2.41, 0.24, 0.76,
        ],
    )
    .unwrap();

    let output = layer.feed_forwards(&input).unwrap();

    let expected_slice = array![[1.5674, -1.5465], [-0.3195, 1.305]];
    let slices = output.to_matrices().unwrap();
    assert_eq!(slices.len(), 4);
    for slice in slices {
        assert!(almost_equal(&slice, &expected_slice, 0.001));
    }
}

#[test]
fn test_convolutional_feed_forward_with_single_output() {
    let layer = ConvolutionalLayer::new(
        Size::new([2, 2]),
        Size::new([1, 1]),
        &[2, 2],
        &[1, 1],
        &[0, 0],
    )
    .unwrap();
    layer.set_weights(array![[5.0, 6.0], [7.0, 8.0]]);
    let layer = Layer::Convolutional(layer);

    let input = Tensor::from_matrix(&array![[1.0, 2.0], [3.0, 4.0]]);
    let output = layer.feed_forwards(&input).unwrap();

    assert_eq!(
        output.to_matrix().unwrap(),
        array![[5.0 * 1.0 + 6.0 * 2.0 + 7.0 * 3.0 + 8.0 * 4.0]]
    );
}

fn transpose_1x1_to_2x2(weights: Array2<f32>) -> Layer {
    let layer = ConvolutionalLayer::new(
        Size::new([1, 1]),
        Size::new([2, 2]),
        &[2, 2],
        &[1, 1],
        &[1, 1],
    )
    .unwrap();
    assert!(layer.is_transpose());
    layer.set_weights(weights);
    Layer::Convolutional(layer)
}

#[test]
fn test_transpose_convolutional_feed_forward() {
    let layer = transpose_1x1_to_2x2(array![[1.0, 2.0], [3.0, 4.0]]);

    let output = layer
        .feed_forwards(&Tensor::from_matrix(&array![[3.0]]))
        .unwrap();

    assert!(almost_equal(
        &output.to_matrix().unwrap(),
        &array![[3.0, 6.0], [9.0, 12.0]],
        0.001
    ));
}

#[test]
fn test_transpose_convolutional_feed_forward_4x4_to_6x6() {
    let layer = ConvolutionalLayer::new(
        Size::new([4, 4]),
        Size::new([6, 6]),
        &[3, 3],
        &[1, 1],
        &[2, 2],
    )
    .unwrap();
    layer.set_weights(array![
        [1.0, 2.0, 3.0],
        [0.0, 1.0, 0.0],
        [2.0, 1.0, 2.0]
    ]);
    let layer = Layer::Convolutional(layer);

    let input = Tensor::from_matrix(&array![
        [1.0, 3.0, 2.0, 1.0],
        [1.0, 3.0, 3.0, 1.0],
        [2.0, 1.0, 1.0, 3.0],
        [3.0, 2.0, 3.0, 3.0]
    ]);

    let output = layer.feed_forwards(&input).unwrap();

    let expected = array![
        [1.0, 5.0, 11.0, 14.0, 8.0, 3.0],
        [1.0, 6.0, 15.0, 18.0, 12.0, 3.0],
        [4.0, 13.0, 21.0, 21.0, 15.0, 11.0],
        [5.0, 17.0, 28.0, 27.0, 25.0, 11.0],
        [4.0, 7.0, 9.0, 12.0, 8.0, 6.0],
        [6.0, 7.0, 14.0, 13.0, 9.0, 6.0]
    ];
    assert!(almost_equal(&output.to_matrix().unwrap(), &expected, 0.001));
}

#[test]
fn test_transpose_convolutional_identity_on_unit_input() {
    let layer = transpose_1x1_to_2x2(array![[0.2, 0.5], [0.3, 0.4]]);

    let output = layer
        .feed_forwards(&Tensor::from_matrix(&array![[1.0]]))
        .unwrap();

    assert!(almost_equal(
        &output.to_matrix().unwrap(),
        &array![[0.2, 0.5], [0.3, 0.4]],
        0.001
    ));
}

#[test]
fn test_transpose_convolutional_back_propagate() {
    let layer = transpose_1x1_to_2x2(array![[0.2, 0.5], [0.3, 0.4]]);
    let input = Tensor::from_matrix(&array![[1.0]]);

    let mut run = TrainingRun::new(1);
    run.set_input(input.clone());
    run.set_output(layer.feed_forwards(&input).unwrap());
    run.set_output_error(Tensor::from_matrix(&array![[0.1, 0.0], [0.0, 0.0]]));

    layer.back_propagate(&mut run).unwrap();

    let expected_delta = array![[0.1, 0.0], [0.0, 0.0]];
    assert!(almost_equal(run.weights_delta().unwrap(), &expected_delta, 0.001));

    let input_error = run.input_error().unwrap();
    assert_eq!(input_error.size(), input.size());
    assert!(almost_equal(
        &input_error.to_matrix().unwrap(),
        &array![[0.02]],
        0.001
    ));
}

#[test]
fn test_convolutional_construction_guards() {
    // dimensionality counts must match
    assert!(matches!(
        ConvolutionalLayer::new(Size::new([3, 3]), Size::new([2]), &[2, 2], &[1, 1], &[0, 0]),
        Err(NetError::InvalidArgument(_))
    ));

    // no dimension may be zero
    assert!(ConvolutionalLayer::new(
        Size::new([3, 0]),
        Size::new([2, 1]),
        &[2, 2],
        &[1, 1],
        &[0, 0]
    )
    .is_err());
    assert!(ConvolutionalLayer::new(
        Size::new([1, 1]),
        Size::new([0, 1]),
        &[1, 1],
        &[1, 1],
        &[0, 0]
    )
    .is_err());

    // an ordinary convolution cannot grow an axis
    assert!(ConvolutionalLayer::new(
        Size::new([3, 3]),
        Size::new([2, 4]),
        &[2, 2],
        &[1, 1],
        &[0, 0]
    )
    .is_err());

    // a transpose convolution cannot shrink an axis
    assert!(ConvolutionalLayer::new(
        Size::new([2, 2]),
        Size::new([1, 5]),
        &[2, 2],
        &[1, 1],
        &[1, 1]
    )
    .is_err());

    // stride and padding arrays must match the dimensionality
    assert!(ConvolutionalLayer::new(
        Size::new([3, 3]),
        Size::new([2, 2]),
        &[2, 2],
        &[1],
        &[0, 0]
    )
    .is_err());
    assert!(ConvolutionalLayer::new(
        Size::new([3, 3]),
        Size::new([2, 2]),
        &[2, 2],
        &[1, 0],
        &[0, 0]
    )
    .is_err());
}

#[test]
fn test_back_propagated_input_error_matches_input_size() {
    // one representative of every layer kind, 1-d and 2-d
    let input_2d = conv_input_3x3();

    let cases: Vec<(Layer, Tensor)> = vec![
        (
            Layer::Dense(DenseLayer::from_lengths(3, 2)),
            Tensor::from_vector(vec![0.1, 0.2, 0.3]),
        ),
        (
            Layer::Activation(ActivationLayer::new(Size::new([3, 3]), Activation::TanH)),
            input_2d.clone(),
        ),
        (conv_3x3_to_2x2(), input_2d.clone()),
        (
            transpose_1x1_to_2x2(array![[0.2, 0.5], [0.3, 0.4]]),
            Tensor::from_matrix(&array![[1.0]]),
        ),
    ];

    for (layer, input) in cases {
        let mut run = TrainingRun::new(1);
        run.set_input(input.clone());
        let output = layer.feed_forwards(&input).unwrap();
        let error = output.map(|_| 0.1);
        run.set_output(output);
        run.set_output_error(error);

        layer.back_propagate(&mut run).unwrap();

        assert_eq!(run.input_error().unwrap().size(), input.size());
    }
}
