use criterion::{Criterion, criterion_group, criterion_main};
use pshelp_copilot::normalize::Normalizer;
use std::hint::black_box;

const HELP_TEXT: &str = "Get-DbaDatabase: Gets SQL Database information for each database that is present on the target instance(s) of SQL Server.\n\n\
Parameters:\n-SqlInstance The target SQL Server instance or instances. This can be a collection and receive pipeline input.\n\
-Database\tThe database(s) to process - this list is auto-populated from the server. If unspecified, all databases will be processed.\n\n\
Example:\nPS C:\\> Get-DbaDatabase -SqlInstance localhost | Where-Object { $_.Status -eq 'Normal' }";

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = HELP_TEXT.repeat(8);
    let normalizer = Normalizer::default();
    let ascii = Normalizer::ascii_only();

    c.bench_function("normalize_default", |b| {
        b.iter(|| normalizer.normalize(black_box(&text)))
    });
    c.bench_function("normalize_ascii_only", |b| {
        b.iter(|| ascii.normalize(black_box(&text)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
