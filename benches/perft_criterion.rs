use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kestrel_chess::board::{Position, STARTING_FEN};
use kestrel_chess::magic::initialize_tables;
use kestrel_chess::move_generator::generate_legal;
use kestrel_chess::perft::perft;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_perft(c: &mut Criterion) {
    initialize_tables().expect("attack tables");

    for (name, fen, depth) in [("startpos", STARTING_FEN, 4), ("kiwipete", KIWIPETE, 3)] {
        let pos = Position::from_fen(fen).expect("valid FEN");
        c.bench_function(&format!("perft_{}_d{}", name, depth), |b| {
            b.iter(|| {
                let mut pos = pos;
                perft(black_box(&mut pos), depth)
            });
        });
    }
}

fn bench_movegen(c: &mut Criterion) {
    initialize_tables().expect("attack tables");
    let pos = Position::from_fen(KIWIPETE).expect("valid FEN");

    c.bench_function("generate_legal_kiwipete", |b| {
        b.iter(|| generate_legal(black_box(&pos)).len());
    });
}

fn bench_make_restore(c: &mut Criterion) {
    initialize_tables().expect("attack tables");
    let mut pos = Position::from_fen(KIWIPETE).expect("valid FEN");
    let moves = generate_legal(&pos);

    c.bench_function("make_restore_kiwipete", |b| {
        b.iter(|| {
            for &mv in &moves {
                let snapshot = pos.make_move(black_box(mv));
                pos.restore(snapshot);
            }
        });
    });
}

criterion_group!(benches, bench_perft, bench_movegen, bench_make_restore);
criterion_main!(benches);
