use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ligo::{constraint, goal, Domain, SearchConfig, Store, Term};

fn queens_goal(qs: &[Term]) -> goal::Goal {
    let n = qs.len();
    let mut goals = Vec::new();
    for q in qs {
        goals.push(goal::dom(q.clone(), Domain::range(1, n as u32)));
    }
    goals.push(goal::posts(
        constraint::gcc(qs.to_vec(), vec![0; n], vec![1; n]).unwrap(),
    ));
    for i in 0..n {
        for j in (i + 1)..n {
            goals.push(goal::posts(
                constraint::abs_diff_not_equal(qs[i].clone(), qs[j].clone(), (j - i) as u32)
                    .unwrap(),
            ));
        }
    }
    goals.push(goal::label(qs.to_vec()));
    goal::all(goals)
}

fn bench_root_propagation(c: &mut Criterion) {
    c.bench_function("cumulative_root_propagation", |b| {
        b.iter(|| {
            let mut store = Store::empty();
            let mut starts = Vec::new();
            for i in 0..8 {
                let (s, v) = store.fresh(&format!("s{}", i));
                store = s
                    .set_domain(&v, &Domain::range(1, 40))
                    .unwrap()
                    .unwrap();
                starts.push(Term::from(&v));
            }
            let c = constraint::cumulative(starts, vec![4; 8], vec![2; 8], 5).unwrap();
            black_box(store.add_constraint(&c).unwrap())
        })
    });
}

fn bench_six_queens(c: &mut Criterion) {
    let names = ["q1", "q2", "q3", "q4", "q5", "q6"];
    c.bench_function("six_queens_all_solutions_sequential", |b| {
        b.iter(|| {
            let solutions =
                ligo::run_with(&SearchConfig::sequential(), None, &names, |qs| queens_goal(qs))
                    .unwrap();
            black_box(solutions)
        })
    });
}

criterion_group!(benches, bench_root_propagation, bench_six_queens);
criterion_main!(benches);
