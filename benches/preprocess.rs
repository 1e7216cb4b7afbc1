use criterion::{criterion_group, criterion_main, Criterion};

use cxxpp::driver::Dui;
use cxxpp::engine::Engine;

fn bench_preprocess_short(c: &mut Criterion) {
    let dui = Dui::default();
    c.bench_function("preprocess", |b| {
        b.iter(|| {
            let input = String::from(
                "\
#define VERSION_MAJOR 3
#define VERSION_MINOR 5
#define CONCAT_(a,b) a##b
#define CONCAT(a,b) CONCAT_(a,b)
#define QUOTE_(x) #x
#define QUOTE(x) QUOTE_(x)
#define MAX(a,b) ((a) > (b) ? (a) : (b))
#define VERSION_STRING QUOTE(VERSION_MAJOR) \".\" QUOTE(VERSION_MINOR)

#ifndef WIDGET_H
#define WIDGET_H

struct Widget {
    int id;
    const char *name;
};

int widget_limit = MAX(VERSION_MAJOR, VERSION_MINOR);
const char *widget_version = VERSION_STRING;
int widget_token = CONCAT(widget_, 1);

#endif
",
            );

            Engine::preprocess_source("bench.c", &input, &dui).unwrap();
        })
    });
}

criterion_group!(benches, bench_preprocess_short);
criterion_main!(benches);
