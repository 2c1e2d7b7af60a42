mod common;

use common::TestEnv;

#[test]
fn zsh_integration_points_at_this_binary() {
    let env = TestEnv::new();
    let (code, stdout, stderr) = env.run(&["init", "zsh"], "");
    assert_eq!(code, 0, "{stderr}");
    let bin = std::path::Path::new(env!("CARGO_BIN_EXE_shai"));
    let name = bin.file_name().unwrap().to_str().unwrap();
    assert!(stdout.contains("add-zsh-hook preexec _shai_preexec"));
    assert!(stdout.contains("hook dispatch --pid $$"));
    assert!(stdout.contains("hook exit --pid $$"));
    assert!(stdout.contains("zle -N _shai_widget"));
    assert!(stdout.contains(name));
}

#[test]
fn unsupported_shell_is_rejected() {
    let env = TestEnv::new();
    let (code, _, _) = env.run(&["init", "fish"], "");
    assert_ne!(code, 0);
}
