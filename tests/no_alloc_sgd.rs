use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;

use sgd_mlp::{Activation, Examples, NetworkBuilder, OutputHead, TrainConfig, Trainer, Vector};

struct CountingAlloc {
    allocs: AtomicUsize,
    reallocs: AtomicUsize,
}

impl CountingAlloc {
    const fn new() -> Self {
        Self {
            allocs: AtomicUsize::new(0),
            reallocs: AtomicUsize::new(0),
        }
    }

    fn reset(&self) {
        self.allocs.store(0, Ordering::Relaxed);
        self.reallocs.store(0, Ordering::Relaxed);
    }

    fn alloc_events(&self) -> usize {
        self.allocs.load(Ordering::Relaxed) + self.reallocs.load(Ordering::Relaxed)
    }
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.reallocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc::new();

fn make_examples(len: usize, input_dim: usize, classes: usize) -> Examples {
    let inputs = (0..len).map(|i| Vector::from_vec(vec![0.1 * (i % 7) as f32; input_dim])).collect();
    let labels = (0..len).map(|i| i % classes).collect();
    Examples::new(inputs, labels).unwrap()
}

// A single test: the counter is process-wide.
#[test]
fn sgd_full_does_not_allocate_per_minibatch() {
    if cfg!(feature = "matrixmultiply") {
        // The `matrixmultiply` backend may allocate internal packing buffers.
        return;
    }

    let input_dim = 32;
    let batch_size = 16;

    let base = NetworkBuilder::new(input_dim)
        .unwrap()
        .hidden(64, Activation::Tanh)
        .unwrap()
        .output(8, OutputHead::default())
        .unwrap()
        .build_with_seed(0)
        .unwrap();

    let train_small = make_examples(batch_size, input_dim, 8);
    let train_large = make_examples(batch_size * 64, input_dim, 8);
    let cfg = TrainConfig {
        epochs: 1,
        batch_size,
        eta: 1e-2,
        ..TrainConfig::default()
    };

    // Warm-up: one-time lazy initialization (log callsites, etc.) is not counted.
    let mut warm = base.clone();
    Trainer::new(&mut warm, &train_small, None)
        .unwrap()
        .sgd_full(&mut StdRng::seed_from_u64(0), &cfg)
        .unwrap();

    let mut small = base.clone();
    let mut trainer = Trainer::new(&mut small, &train_small, None).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    ALLOC.reset();
    trainer.sgd_full(&mut rng, &cfg).unwrap();
    let alloc_small = ALLOC.alloc_events();

    let mut large = base;
    let mut trainer = Trainer::new(&mut large, &train_large, None).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    ALLOC.reset();
    trainer.sgd_full(&mut rng, &cfg).unwrap();
    let alloc_large = ALLOC.alloc_events();

    assert_eq!(
        alloc_small, alloc_large,
        "allocation count should not depend on the number of minibatches"
    );
}
