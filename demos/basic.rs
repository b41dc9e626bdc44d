use rulegraph::Rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mail {
    Birthday,
    Sunday,
    Promo,
    Daily,
}

#[derive(Debug)]
struct Day {
    is_birthday: bool,
    is_sunday: bool,
    is_promo: bool,
}

fn main() {
    let rules = Rules::<Day, Mail>::new()
        .add(|r| {
            r.with_id("birthday")
                .with_priority(i32::MAX)
                .when(|d: &Day| d.is_birthday)
                .then_return(Mail::Birthday)
        })
        .add(|r| {
            r.with_id("sunday")
                .with_priority(i32::MAX - 1)
                .when(|d: &Day| d.is_sunday)
                .then_return(Mail::Sunday)
        })
        .add(|r| {
            r.with_id("promo")
                .with_priority(i32::MAX - 2)
                .when(|d: &Day| d.is_promo)
                .then_return(Mail::Promo)
        })
        .add(|r| r.with_id("daily").with_priority(i32::MIN).then_return(Mail::Daily));

    let days = [
        Day { is_birthday: true, is_sunday: true, is_promo: false },
        Day { is_birthday: false, is_sunday: true, is_promo: true },
        Day { is_birthday: false, is_sunday: false, is_promo: true },
        Day { is_birthday: false, is_sunday: false, is_promo: false },
    ];

    for day in &days {
        let mail = rules.apply_first(day).expect("rules failed");
        let all = rules.apply_all(day).expect("rules failed");
        let mut matched: Vec<&str> = all.keys().map(String::as_str).collect();
        matched.sort_unstable();
        println!("{day:?} -> send {mail:?} (matching: {matched:?})");
    }
}
