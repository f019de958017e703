use archgraph::config::{LayoutConfig, NodeMetrics};
use archgraph::edge::{Connection, create_edge_at};
use archgraph::format::{Format, export, import};
use archgraph::layout::{LayoutDirection, layout_with};
use archgraph::model::{Diagram, Metadata, Node, Position};
use archgraph::render::render_svg;
use archgraph::theme::Theme;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A chain of `nodes` platforms plus up to `extra_edges` forward skips.
fn dense_diagram(nodes: usize, extra_edges: usize) -> Diagram {
    let mut diagram = Diagram::new();
    for i in 0..nodes {
        let id = (i + 1).to_string();
        let position = Position::new((i % 10) as f64 * 300.0, (i / 10) as f64 * 250.0);
        diagram.nodes.push(
            Node::platform(id, position)
                .with_attribute("Port", (8000 + i).to_string())
                .with_attribute("Owner", "team"),
        );
    }
    let mut stamp = 0;
    let mut connect = |diagram: &mut Diagram, from: usize, to: usize| {
        let connection = Connection::new(
            (from + 1).to_string(),
            "right-source",
            (to + 1).to_string(),
            "left-target",
        );
        if let Ok(edge) = create_edge_at(&connection, stamp) {
            diagram.edges.push(edge);
        }
        stamp += 1;
    };
    for i in 0..nodes.saturating_sub(1) {
        connect(&mut diagram, i, i + 1);
    }
    let mut count = 0usize;
    'outer: for i in 0..nodes {
        for j in (i + 2)..nodes {
            if count >= extra_edges {
                break 'outer;
            }
            connect(&mut diagram, i, j);
            count += 1;
        }
    }
    diagram
}

const SIZES: [(&str, usize, usize); 4] = [
    ("tiny", 5, 2),
    ("medium", 40, 30),
    ("large", 150, 120),
    ("wide", 300, 20),
];

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    let metrics = NodeMetrics::default();
    for (name, nodes, extra) in SIZES {
        let diagram = dense_diagram(nodes, extra);
        for direction in [LayoutDirection::TopBottom, LayoutDirection::LeftRight] {
            let id = format!("{name}_{}", direction.as_token());
            group.bench_with_input(BenchmarkId::from_parameter(id), &diagram, |b, data| {
                b.iter(|| {
                    let laid = layout_with(
                        black_box(&data.nodes),
                        &data.edges,
                        direction,
                        &config,
                        &metrics,
                    );
                    black_box(laid.len());
                });
            });
        }
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let metadata = Metadata::named("bench");
    for (name, nodes, extra) in SIZES {
        let diagram = dense_diagram(nodes, extra);
        for format in [Format::Json, Format::Xml] {
            let id = format!("{name}_{}", format.extension());
            group.bench_with_input(BenchmarkId::from_parameter(id), &diagram, |b, data| {
                b.iter(|| {
                    let text = export(black_box(data), &metadata, format).expect("export failed");
                    black_box(text.len());
                });
            });
        }
    }
    group.finish();
}

fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import");
    let metadata = Metadata::named("bench");
    for (name, nodes, extra) in SIZES {
        let diagram = dense_diagram(nodes, extra);
        for format in [Format::Json, Format::Xml] {
            let text = export(&diagram, &metadata, format).expect("export failed");
            let id = format!("{name}_{}", format.extension());
            group.bench_with_input(BenchmarkId::from_parameter(id), &text, |b, data| {
                b.iter(|| {
                    let imported = import(black_box(data), Format::Auto).expect("import failed");
                    black_box(imported.diagram.nodes.len());
                });
            });
        }
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let theme = Theme::modern();
    let metrics = NodeMetrics::default();
    for (name, nodes, extra) in SIZES {
        let diagram = dense_diagram(nodes, extra);
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, data| {
            b.iter(|| {
                let svg = render_svg(black_box(data), &theme, &metrics);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_serialize, bench_import, bench_render
);
criterion_main!(benches);
