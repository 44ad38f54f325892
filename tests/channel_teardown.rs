//! Kept as the only test in this binary: it counts the process's open file
//! descriptors, which any concurrently running test would disturb.

#[cfg(target_os = "linux")]
fn open_fd_count() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .expect("read /proc/self/fd")
        .count()
}

#[cfg(target_os = "linux")]
#[test]
fn parent_holds_no_pipe_endpoints_after_build() {
    use peri::jobs;
    use peri::parser::Segment;
    use peri::pipeline;

    let before = open_fd_count();

    let segments = vec![
        Segment::parse("printf data"),
        Segment::parse("peri-no-such-program"),
        Segment::parse("cat"),
        Segment::parse("wc -c > /dev/null"),
    ];
    let job = pipeline::build(segments, false).expect("pipes allocated");
    assert_eq!(job.channel_count, 3);
    assert_eq!(job.handles.len(), 3);

    let after = open_fd_count();
    let _ = jobs::wait(job, &mut std::io::sink(), &mut std::io::sink());

    assert_eq!(before, after, "pipe endpoints leaked into the parent");
}
