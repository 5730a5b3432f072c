use std::hint::black_box;

use codspeed_criterion_compat::{Criterion, Throughput, criterion_group, criterion_main};
use kerf_tokenizer::{CodeTokenizer, MarkupTokenizer, SeekableSource, Tokenize};

static MARKUP: &str = r#"
<!DOCTYPE html>
<html>
<head><title>@ViewBag.Title</title></head>
<body class="main" data-user='@user.Id'>
    <!-- navigation -->
    <nav><a href="/home">Home</a> | <a href="mailto:someone@example.com">Mail</a></nav>
    <p>Hello @user.Name, you have @messages.Count new messages.</p>
    @* a razor comment *@
    <![CDATA[ raw <data> ]]>
</body>
</html>
"#;

static CODE: &str = r#"
var total = 0;
foreach (var item in Model.Items) {
    if (item.Price > 10.5m && item.Name != "free") {
        total += item.Quantity * 0x10;
    } else {
        total -= 1;
    }
}
var label = $"Total: {total}";
var path = @"C:\temp\file.txt";
char c = 'x'; // trailing comment
/* block comment */ int? maybe = null ?? 3;
"#;

fn iterate<T: Tokenize>(text: &str) {
    let mut source = SeekableSource::new(text);
    let mut tokenizer = T::default();
    while let Some(token) = tokenizer.next_token(&mut source) {
        black_box(token);
    }
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    let markup = MARKUP.repeat(20);
    group.throughput(Throughput::Bytes(markup.len() as u64));
    group.bench_with_input("markup", &markup, |b, s| b.iter(|| iterate::<MarkupTokenizer>(s)));

    let code = CODE.repeat(20);
    group.throughput(Throughput::Bytes(code.len() as u64));
    group.bench_with_input("code", &code, |b, s| b.iter(|| iterate::<CodeTokenizer>(s)));

    group.finish();
}

criterion_group!(benches, bench_iterate);
criterion_main!(benches);
