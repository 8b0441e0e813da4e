use approx::assert_relative_eq;
use dotgeneral::{
    dot_general_naive, execute_fast_path, Buffer, CapabilityFlags, CapabilityProvider, DType,
    DotGeneralAxes, DotGeneralError, Engine, EngineConfig, ExecPath, FastPathKind, NativeProvider,
    Operand, ScalarOnlyProvider, Shape, Tier, VectorOnlyProvider,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn streaming_flags() -> CapabilityFlags {
    CapabilityFlags {
        streaming_matrix: true,
        vector: true,
        ..CapabilityFlags::SCALAR
    }
}

fn providers() -> Vec<Box<dyn CapabilityProvider>> {
    vec![
        Box::new(ScalarOnlyProvider),
        Box::new(VectorOnlyProvider),
        Box::new(streaming_flags()),
        Box::new(NativeProvider::detect()),
    ]
}

fn random_f32(rng: &mut StdRng, dims: &[usize]) -> Buffer {
    let len: usize = dims.iter().product();
    let data: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    Buffer::from_vec(dims, data).unwrap()
}

fn assert_close(got: &Buffer, want: &Buffer) {
    assert_eq!(got.dims(), want.dims());
    let got = got.as_slice::<f32>().unwrap();
    let want = want.as_slice::<f32>().unwrap();
    for (g, w) in got.iter().zip(want) {
        assert_relative_eq!(*g, *w, epsilon = 1e-4, max_relative = 1e-4);
    }
}

struct Case {
    lhs: &'static [usize],
    rhs: &'static [usize],
    axes: DotGeneralAxes,
}

fn cases() -> Vec<Case> {
    vec![
        // fast-path patterns
        Case {
            lhs: &[8, 4],
            rhs: &[4, 6],
            axes: DotGeneralAxes::matmul(),
        },
        Case {
            lhs: &[13, 70],
            rhs: &[70],
            axes: DotGeneralAxes::new(&[1], &[0]),
        },
        Case {
            lhs: &[3, 9, 17],
            rhs: &[3, 17, 10],
            axes: DotGeneralAxes::batched_matmul(),
        },
        Case {
            lhs: &[2, 2, 5, 8],
            rhs: &[2, 2, 8, 3],
            axes: DotGeneralAxes::new(&[3], &[2]).with_batch(&[0, 1], &[0, 1]),
        },
        // general-path layouts
        Case {
            lhs: &[8, 4],
            rhs: &[6, 4],
            axes: DotGeneralAxes::new(&[1], &[1]),
        },
        Case {
            lhs: &[70, 66],
            rhs: &[70, 65],
            axes: DotGeneralAxes::new(&[0], &[0]),
        },
        Case {
            lhs: &[4, 3, 5, 6],
            rhs: &[6, 7, 4, 5],
            axes: DotGeneralAxes::new(&[3, 2], &[0, 3]).with_batch(&[0], &[2]),
        },
        Case {
            lhs: &[5],
            rhs: &[7],
            axes: DotGeneralAxes::new(&[], &[]),
        },
        Case {
            lhs: &[100],
            rhs: &[100],
            axes: DotGeneralAxes::new(&[0], &[0]),
        },
        Case {
            lhs: &[2, 130, 3],
            rhs: &[130, 2],
            axes: DotGeneralAxes::new(&[1], &[0]).with_batch(&[0], &[1]),
        },
    ]
}

#[test]
fn test_every_case_and_tier_matches_reference() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(42);
    for case in cases() {
        let lhs = random_f32(&mut rng, case.lhs);
        let rhs = random_f32(&mut rng, case.rhs);
        let expected = dot_general_naive(&lhs, &rhs, &case.axes).unwrap();
        for provider in providers() {
            for fast_path in [true, false] {
                let config = EngineConfig::default().with_fast_path(fast_path);
                let engine = Engine::with_provider(provider.as_ref()).with_config(config);
                let got = engine.dot_general(&lhs, &rhs, &case.axes).unwrap();
                assert_close(&got, &expected);
            }
        }
    }
}

#[test]
fn test_every_block_dim_matches_reference() {
    let mut rng = StdRng::seed_from_u64(5);
    let lhs = random_f32(&mut rng, &[3, 37, 29]);
    let rhs = random_f32(&mut rng, &[3, 23, 29]);
    let axes = DotGeneralAxes::new(&[2], &[2]).with_batch(&[0], &[0]);
    let expected = dot_general_naive(&lhs, &rhs, &axes).unwrap();
    for block_dim in [1usize, 3, 4, 5, 8, 16, 64] {
        for parallel in [true, false] {
            let config = EngineConfig::default()
                .with_block_dim(block_dim)
                .with_parallel(parallel)
                .with_min_parallel_work(0);
            let engine = Engine::with_provider(VectorOnlyProvider).with_config(config);
            let got = engine.dot_general(&lhs, &rhs, &axes).unwrap();
            assert_close(&got, &expected);
        }
    }
}

#[test]
fn test_matvec_on_general_path_stays_narrow() {
    let mut rng = StdRng::seed_from_u64(23);
    // [K, M] lhs is not canonical, so this matrix-vector product is blocked
    let lhs = random_f32(&mut rng, &[300, 200]);
    let rhs = random_f32(&mut rng, &[300]);
    let axes = DotGeneralAxes::new(&[0], &[0]);
    let mut out = Buffer::zeros(Shape::new(&[200], DType::F32));
    let engine = Engine::with_provider(streaming_flags());
    let path = engine.dot_general_into(&lhs, &rhs, &axes, &mut out).unwrap();
    assert_eq!(
        path,
        ExecPath::Blocked {
            tier: Tier::Vector,
            block_dim: 4
        }
    );
    assert_close(&out, &dot_general_naive(&lhs, &rhs, &axes).unwrap());
}

#[test]
fn test_fast_path_128_ones_times_twos() {
    let lhs = Buffer::from_vec(&[128, 128], vec![1.0f32; 128 * 128]).unwrap();
    let rhs = Buffer::from_vec(&[128, 128], vec![2.0f32; 128 * 128]).unwrap();
    let axes = DotGeneralAxes::matmul();
    for provider in providers() {
        let engine = Engine::with_provider(provider.as_ref());
        let mut out = Buffer::zeros(Shape::new(&[128, 128], DType::F32));
        let path = engine.dot_general_into(&lhs, &rhs, &axes, &mut out).unwrap();
        assert_eq!(path, ExecPath::FastPath(FastPathKind::MatMul));
        assert!(out.as_slice::<f32>().unwrap().iter().all(|&x| x == 256.0));
    }
}

#[test]
fn test_contiguous_accepted_transposed_rejected() {
    let mut rng = StdRng::seed_from_u64(9);
    let lhs = random_f32(&mut rng, &[8, 4]);
    let rhs = random_f32(&mut rng, &[4, 6]);
    let rhs_t = random_f32(&mut rng, &[6, 4]);
    let mut out = Buffer::zeros(Shape::new(&[8, 6], DType::F32));

    let matmul = DotGeneralAxes::matmul();
    let accepted = execute_fast_path(&VectorOnlyProvider, &lhs, &rhs, &matmul, &mut out);
    assert_eq!(accepted, Ok(true));
    assert_close(&out, &dot_general_naive(&lhs, &rhs, &matmul).unwrap());

    let transposed = DotGeneralAxes::new(&[1], &[1]);
    let declined = execute_fast_path(&VectorOnlyProvider, &lhs, &rhs_t, &transposed, &mut out);
    assert_eq!(declined, Ok(false));

    let engine = Engine::with_provider(VectorOnlyProvider);
    let path = engine.dot_general_into(&lhs, &rhs_t, &transposed, &mut out).unwrap();
    assert!(matches!(path, ExecPath::Blocked { .. }));
    assert_close(&out, &dot_general_naive(&lhs, &rhs_t, &transposed).unwrap());
}

#[test]
fn test_integer_and_f64_dtypes_exact() {
    let mut rng = StdRng::seed_from_u64(17);
    let axes = DotGeneralAxes::new(&[0, 2], &[2, 1]).with_batch(&[1], &[0]);
    let (lhs_dims, rhs_dims) = ([6usize, 3, 9], [3usize, 9, 6, 5]);
    let lhs_len: usize = lhs_dims.iter().product();
    let rhs_len: usize = rhs_dims.iter().product();
    let engine = Engine::new();

    let lhs_i: Vec<i64> = (0..lhs_len).map(|_| rng.gen_range(-50..50)).collect();
    let rhs_i: Vec<i64> = (0..rhs_len).map(|_| rng.gen_range(-50..50)).collect();
    let lhs = Buffer::from_vec(&lhs_dims, lhs_i.clone()).unwrap();
    let rhs = Buffer::from_vec(&rhs_dims, rhs_i.clone()).unwrap();
    assert_eq!(
        engine.dot_general(&lhs, &rhs, &axes).unwrap(),
        dot_general_naive(&lhs, &rhs, &axes).unwrap()
    );

    let lhs32 = Buffer::from_vec(&lhs_dims, lhs_i.iter().map(|&x| x as i32).collect()).unwrap();
    let rhs32 = Buffer::from_vec(&rhs_dims, rhs_i.iter().map(|&x| x as i32).collect()).unwrap();
    let out32 = engine.dot_general(&lhs32, &rhs32, &axes).unwrap();
    assert_eq!(out32.dims(), &[3, 5]);
    assert_eq!(out32, dot_general_naive(&lhs32, &rhs32, &axes).unwrap());

    // small integers are exact in f64 regardless of summation order
    let lhs64 = Buffer::from_vec(&lhs_dims, lhs_i.iter().map(|&x| x as f64).collect()).unwrap();
    let rhs64 = Buffer::from_vec(&rhs_dims, rhs_i.iter().map(|&x| x as f64).collect()).unwrap();
    let mut out64 = Buffer::zeros(Shape::new(&[3, 5], DType::F64));
    let path = engine.dot_general_into(&lhs64, &rhs64, &axes, &mut out64).unwrap();
    assert_eq!(
        path,
        ExecPath::Blocked {
            tier: Tier::Scalar,
            block_dim: 4
        }
    );
    assert_eq!(out64, dot_general_naive(&lhs64, &rhs64, &axes).unwrap());
}

#[test]
fn test_zero_sized_dimensions() {
    let engine = Engine::new();

    // empty contraction: all zeros
    let lhs = Buffer::from_vec::<f32>(&[4, 0], vec![]).unwrap();
    let rhs = Buffer::from_vec::<f32>(&[5, 0], vec![]).unwrap();
    let out = engine.dot_general(&lhs, &rhs, &DotGeneralAxes::new(&[1], &[1])).unwrap();
    assert_eq!(out.dims(), &[4, 5]);
    assert!(out.as_slice::<f32>().unwrap().iter().all(|&x| x == 0.0));

    // empty cross dimension: empty output
    let lhs = Buffer::from_vec::<i32>(&[0, 3], vec![]).unwrap();
    let rhs = Buffer::from_vec(&[3, 2], vec![1i32; 6]).unwrap();
    let out = engine.dot_general(&lhs, &rhs, &DotGeneralAxes::matmul()).unwrap();
    assert_eq!(out.dims(), &[0, 2]);
    assert!(out.is_empty());
}

#[test]
fn test_metadata_errors() {
    let engine = Engine::new();
    let lhs = Buffer::from_vec(&[2, 3], vec![1.0f32; 6]).unwrap();
    let rhs = Buffer::from_vec(&[3, 4], vec![1.0f32; 12]).unwrap();

    assert_eq!(
        engine.dot_general(&lhs, &rhs, &DotGeneralAxes::new(&[1], &[5])),
        Err(DotGeneralError::InvalidAxis {
            operand: Operand::Rhs,
            axis: 5,
            rank: 2
        })
    );
    assert!(matches!(
        engine.dot_general(&lhs, &rhs, &DotGeneralAxes::new(&[0], &[0])),
        Err(DotGeneralError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        engine.dot_general(&lhs, &rhs, &DotGeneralAxes::new(&[1], &[0]).with_batch(&[1], &[1])),
        Err(DotGeneralError::DuplicateAxis {
            operand: Operand::Lhs,
            axis: 1
        })
    ));

    let rhs_i = Buffer::from_vec(&[3, 4], vec![1i32; 12]).unwrap();
    assert!(matches!(
        engine.dot_general(&lhs, &rhs_i, &DotGeneralAxes::matmul()),
        Err(DotGeneralError::DTypeMismatch { .. })
    ));

    let err = engine
        .dot_general(&lhs, &rhs, &DotGeneralAxes::new(&[1], &[]))
        .unwrap_err();
    assert_eq!(err.to_string(), "contracting axis count mismatch: lhs has 1, rhs has 0");
}

#[test]
fn test_inputs_never_mutated() {
    let mut rng = StdRng::seed_from_u64(1);
    let lhs = random_f32(&mut rng, &[16, 12]);
    let rhs = random_f32(&mut rng, &[12, 16]);
    let (lhs_before, rhs_before) = (lhs.clone(), rhs.clone());
    let engine = Engine::with_provider(streaming_flags());
    engine.dot_general(&lhs, &rhs, &DotGeneralAxes::matmul()).unwrap();
    engine
        .dot_general(&lhs, &rhs, &DotGeneralAxes::new(&[0], &[1]))
        .unwrap();
    assert_eq!(lhs, lhs_before);
    assert_eq!(rhs, rhs_before);
}
