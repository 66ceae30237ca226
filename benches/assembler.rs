use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sap_programmer::assembler::assemble;
use sap_programmer::disassembler::disassemble;
use sap_programmer::transfer::RamImage;

fn criterion_benchmark(c: &mut Criterion) {
    // Count down from three, with forward references and data
    let program = r#"
        ; counter
              LDA CNT
        LOOP: SUB ONE
              OUT
              JZ  DONE
              JMP LOOP
        DONE: HLT
        ONE:  DB 1
        CNT:  DB $3
    "#;

    let mut group = c.benchmark_group("Assembler");

    group.bench_function("assemble_counter", |b| {
        b.iter_batched(
            RamImage::new,
            |mut ram| {
                let report = assemble(&mut ram, black_box(program), 0);
                black_box(report.bytes_written);
            },
            criterion::BatchSize::SmallInput,
        );
    });

    let mut ram = RamImage::new();
    assemble(&mut ram, program, 0);
    group.bench_function("disassemble_ram", |b| {
        b.iter(|| disassemble(&mut ram, 0, black_box(16)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
