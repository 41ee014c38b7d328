use score_core::{
    error::ScoreError,
    lilypond_render::render_events,
    notation::read_events,
    primitives::{
        get_dot_number, get_dotted_value, get_undotted_value, parse_duration,
        rational::gcd, Absolute, Rational, Span, Time,
    },
    ScoreSettings,
};

#[test]
fn rational_properties() {
    let values = [
        Rational::raw(6, 8),
        Rational::raw(-4, 6),
        Rational::raw(0, 5),
        Rational::raw(7, 3),
        Rational::raw(3, -9),
    ];
    for a in values {
        let short = a.shorten();
        let again = short.shorten();
        assert_eq!(
            (again.numerator(), again.denominator()),
            (short.numerator(), short.denominator())
        );
        assert!(short.denominator() > 0);
        for b in values {
            for result in [a.add(b), a.sub(b)] {
                assert_eq!(gcd(result.numerator(), result.denominator()).abs(), 1);
            }
            assert_eq!(a.compare(&b), -b.compare(&a));
            assert_eq!(a.compare(&b), a.sub(b).numerator().signum() as i32);
        }
    }
    assert_eq!(gcd(0, 7), 7);
}

#[test]
fn time_domains() {
    let start = Absolute::new(1, 2);
    let end = Time::add_time(start, Span::new(3, 8));
    assert_eq!(end, Absolute::new(7, 8));
    assert_eq!(Time::get_span(start, end), Span::new(3, 8));
}

#[test]
fn duration_round_trip() {
    for token in ["1", "2", "2.", "2..", "4...", "8", "16.", "128", "\\breve", "\\longa."] {
        let span = parse_duration(token).unwrap();
        let dots = get_dot_number(span).unwrap();
        let undotted = get_undotted_value(span).unwrap();
        assert_eq!(get_dotted_value(undotted, dots), span, "{token}");
    }
    assert_eq!(parse_duration("2..").unwrap(), Span::new(7, 8));
    assert!(matches!(
        get_dot_number(Span::new(5, 8)),
        Err(ScoreError::IllegalDuration(_))
    ));
}

#[test]
fn render_reads_back() {
    let settings = ScoreSettings::default();
    let text = "\\clef bass \\key es \\major c8.( d16 e4~ e2) <g, b, d>1\\fermata r2 s4 \\grace f16 g4";
    let events = read_events(text, &settings).unwrap();
    let rendered = render_events(&events).unwrap();
    assert_eq!(read_events(&rendered, &settings).unwrap(), events);
}
