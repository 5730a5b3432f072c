use std::hint::black_box;

use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use kerf_parse::{ParserOptions, parse, parse_and_bind};
use kerf_syntax::{BoundAttribute, TagDescriptor, TagMatchingRule};

static SIMPLE: &str = "<p>Hello @user.Name!</p>\n";

static MEDIUM: &str = r#"@inherits PageBase<Model>
@{
    var title = "Orders";
}
<h1>@title</h1>
<ul>
@foreach (var order in Model.Orders) {
    <li class="@(order.Late ? "late" : "")">
        @order.Id: @order.Total.ToString("C")
        @if (order.Notes != null) {
            <text>@order.Notes</text>
        }
    </li>
}
</ul>
@section Footer {
    <footer>@DateTime.Now.Year</footer>
}
"#;

static TAGS: &str = r#"<card title="Summary" count="@Model.Count">
    <card-row>@Model.First</card-row>
    <card-row>@Model.Second</card-row>
</card>
"#;

fn descriptors() -> Vec<TagDescriptor> {
    vec![
        TagDescriptor::new("CardTagHelper")
            .rule(TagMatchingRule::new("card"))
            .attribute(BoundAttribute::new("title", "string"))
            .attribute(BoundAttribute::new("count", "int")),
        TagDescriptor::new("CardRowTagHelper")
            .rule(TagMatchingRule::new("card-row").with_parent("card")),
    ]
}

fn benchmark_parser(c: &mut Criterion) {
    let options = ParserOptions::default();
    let files = [("Simple", SIMPLE.to_owned()), ("Medium", MEDIUM.repeat(10))];

    let mut group = c.benchmark_group("Parser Benchmark");

    for (name, text) in &files {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), text, |b, text| {
            b.iter(|| black_box(parse(text, &options)));
        });
    }

    let tags = TAGS.repeat(10);
    group.throughput(Throughput::Bytes(tags.len() as u64));
    group.bench_with_input(BenchmarkId::new("parse_and_bind", "Tags"), &tags, |b, text| {
        b.iter(|| black_box(parse_and_bind(text, &options, descriptors(), None)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_parser);
criterion_main!(benches);
