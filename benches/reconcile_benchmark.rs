//! Benchmarks for unform reconciliation performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks run the pipeline over synthetic block graphs.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use unform::{
    similarity_ratio, Block, BlockGraph, BoundingBox, ReconcileOptions, Reconciler,
    SchemaTemplate,
};

/// Creates a synthetic page with `pairs` key/value sets, a checkbox
/// cluster and one table of `rows` rows.
fn create_test_page(pairs: usize, rows: usize) -> BlockGraph {
    let mut blocks = Vec::new();

    for i in 0..pairs {
        let top = 0.05 + (i as f64 / pairs as f64) * 0.4;
        blocks.push(
            Block::key(format!("k{}", i))
                .with_children([format!("kw{}a", i), format!("kw{}b", i)])
                .with_value(format!("v{}", i)),
        );
        blocks.push(Block::word(format!("kw{}a", i), "Field"));
        blocks.push(Block::word(format!("kw{}b", i), format!("{}:", i)));
        blocks.push(
            Block::value(format!("v{}", i))
                .with_children([format!("vw{}", i)])
                .with_box(BoundingBox::new(top, 0.5, 0.1, 0.01)),
        );
        blocks.push(Block::word(format!("vw{}", i), format!("${},{}00.5O", i, i)));
    }

    blocks.push(Block::line("anchor", "Gas Disposition").with_box(BoundingBox::new(0.5, 0.1, 0.3, 0.02)));
    for (i, label) in ["Sold", "Flared", "Vented"].iter().enumerate() {
        let top = 0.52 + i as f64 * 0.02;
        blocks.push(
            Block::key(format!("ck{}", i))
                .with_children([format!("cw{}", i)])
                .with_value(format!("cv{}", i)),
        );
        blocks.push(Block::word(format!("cw{}", i), *label));
        blocks.push(
            Block::value(format!("cv{}", i))
                .with_children([format!("cs{}", i)])
                .with_box(BoundingBox::new(top, 0.12, 0.02, 0.02)),
        );
        blocks.push(Block::selection(format!("cs{}", i), i == 0));
    }

    let cell_ids: Vec<String> = (0..rows * 3).map(|i| format!("cell{}", i)).collect();
    blocks.push(Block::new("table", unform::BlockType::Table).with_children(cell_ids.clone()));
    for (i, id) in cell_ids.iter().enumerate() {
        let row = (i / 3) as u32 + 1;
        let col = (i % 3) as u32 + 1;
        let text = if row == 1 && col == 1 {
            "Deductions".to_string()
        } else {
            format!("r{}c{}", row, col)
        };
        blocks.push(Block::cell(id.clone(), row, col).with_text(text));
    }

    blocks.into_iter().collect()
}

fn create_test_template(pairs: usize) -> SchemaTemplate {
    let fields: Vec<String> = (0..pairs)
        .step_by(4)
        .map(|i| format!(r#""Field {}": "float_dollar""#, i))
        .collect();
    SchemaTemplate::from_json(&format!(
        r#"{{"Statement": {{{}}}, "Fees": {{"Deductions": {{"TableName": "Deductions"}}}}, "Gas": "string"}}"#,
        fields.join(", ")
    ))
    .unwrap()
}

/// Benchmark the similarity ratio on typical field names.
fn bench_similarity(c: &mut Criterion) {
    c.bench_function("similarity_ratio", |b| {
        b.iter(|| {
            similarity_ratio(
                black_box("total producer payment"),
                black_box("producer total payment due"),
            )
        });
    });
}

/// Benchmark single-page reconciliation at various sizes.
fn bench_reconcile_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_page");

    for pairs in [10, 50, 100].iter() {
        let graph = create_test_page(*pairs, 20);
        let reconciler = Reconciler::new(create_test_template(*pairs), ReconcileOptions::default());

        group.bench_function(format!("{}_pairs", pairs), |b| {
            b.iter(|| reconciler.reconcile_page(1, black_box(&graph)));
        });
    }

    group.finish();
}

/// Benchmark multi-page reconciliation, sequential against parallel.
fn bench_reconcile_pages(c: &mut Criterion) {
    let pages: Vec<BlockGraph> = (0..8).map(|_| create_test_page(50, 20)).collect();
    let template = create_test_template(50);

    let mut group = c.benchmark_group("reconcile_pages");
    for parallel in [false, true] {
        let options = ReconcileOptions::new().with_parallel(parallel);
        let reconciler = Reconciler::new(template.clone(), options);
        let name = if parallel { "parallel" } else { "sequential" };

        group.bench_function(name, |b| {
            b.iter(|| reconciler.reconcile_pages(black_box(&pages)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_similarity,
    bench_reconcile_page,
    bench_reconcile_pages,
);
criterion_main!(benches);
