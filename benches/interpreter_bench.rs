use std::io;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use quill::{interpret, parse_str};

const FIB: &str = r#"
func fib(n) {
    if n < 2 { return n }
    return fib(n - 1) + fib(n - 2)
}
echo(fib(15))
"#;

const LOOP: &str = r#"
var total = 0
var squares = []
for var i = 0; i < 500; i = i + 1 {
    if i % 3 == 0 { continue }
    total = total + i
    push(squares, i * i)
}
var even = filter(squares, func(x) { return x % 2 == 0 })
echo(total, len(even))
"#;

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interpreter");

    for (name, program) in [("fib", FIB), ("loop", LOOP)] {
        group.bench_with_input(BenchmarkId::new("parse", name), program, |b, input| {
            b.iter(|| parse_str(black_box(input)))
        });
        group.bench_with_input(BenchmarkId::new("interpret", name), program, |b, input| {
            b.iter(|| interpret(black_box(input), &mut io::sink()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
