mod common;

use common::TestEnv;

#[test]
fn buffer_is_replaced_with_generated_command() {
    let env = TestEnv::new();
    env.generator_answers(0, "find . -size +100M");
    let (code, stdout, _) = env.run(
        &["widget", "--pid", "80", "--", "list files over 100mb"],
        "ls\n",
    );
    assert_eq!(code, 0);
    assert_eq!(stdout, "find . -size +100M\n");
    // The widget always asks for the short form.
    assert!(env.generator_args().iter().any(|a| a == "-q"));
}

#[test]
fn destructive_command_replaces_buffer_commented() {
    let env = TestEnv::new();
    env.generator_answers(2, "rm -rf ./build");
    let (code, stdout, _) = env.run(&["widget", "--pid", "81", "--", "remove build dir"], "");
    assert_eq!(code, 0);
    assert_eq!(stdout, "# rm -rf ./build\n");
}

#[test]
fn failure_keeps_original_text_with_status() {
    let env = TestEnv::new();
    env.generator_answers(1, "");
    let (code, stdout, _) = env.run(&["widget", "--pid", "82", "--", "make coffee"], "");
    assert_eq!(code, 1);
    assert!(stdout.starts_with("make coffee  # shai: "), "{stdout}");
}

#[test]
fn retry_after_failure_uses_original_text() {
    let env = TestEnv::new();
    env.generator_answers(1, "");
    let (_, first, _) = env.run(&["widget", "--pid", "83", "--", "make coffee"], "");

    env.generator_answers(0, "brew coffee");
    let (code, stdout, _) = env.run(&["widget", "--pid", "83", "--", first.trim_end()], "");
    assert_eq!(code, 0);
    assert_eq!(stdout, "brew coffee\n");
    let args = env.generator_args();
    let at = args.iter().position(|a| a == "--").unwrap();
    assert_eq!(&args[at + 1..], ["make", "coffee"]);
}

#[test]
fn empty_buffer_does_not_call_generator() {
    let env = TestEnv::new();
    env.generator_answers(0, "ls");
    let (code, stdout, _) = env.run(&["widget", "--pid", "84", "--", ""], "");
    assert_ne!(code, 0);
    assert!(stdout.contains("# shai: "));
    assert!(env.generator_stdin().is_none());
}
