//! Rendering behaviour over realistic dotfile templates.

use std::fs;
use std::path::Path;

use rstest::rstest;
use swatch_core::{OsName, Settings};
use swatch_renderer::{RenderContext, RenderError, TemplateEngine, TemplateKind};
use tempfile::TempDir;

const WAYFIRE_SCRIPT: &str = r#"{{- if eq .os "linux" -}}
#!/bin/sh
set -eu
cp "$HOME/.config/wayfire/themes/{{ .current_theme }}.ini" "$HOME/.config/wayfire/theme.ini"
{{- end }}
"#;

const WINDOWS_SCRIPT: &str = r#"{{- if eq .os "windows" -}}
$theme = "{{ .current_theme }}"
Copy-Item "$env:LOCALAPPDATA\themes\$theme.json" "$env:LOCALAPPDATA\theme.json"
{{- end }}
"#;

const TERMINAL_CONFIG: &str = r#"font = "{{ .current_font }}"
size = {{ .font_size | default "12" }}
{{- if eq .os "windows" }}
shell = "pwsh.exe"
{{- else if eq .os "linux" }}
shell = "/bin/bash"
{{- else }}
shell = "/bin/zsh"
{{- end }}
"#;

fn settings() -> Settings {
    [
        ("current_theme", "gruvbox"),
        ("current_font", "Agave Nerd Font"),
    ]
    .into_iter()
    .collect()
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn linux_script_renders_empty_on_windows_and_back() {
    let engine = TemplateEngine::from_sources([
        ("run_dot_config/.theme-trigger_apply-wayfire-theme.sh.tmpl", WAYFIRE_SCRIPT),
        ("run_dot_config/.theme-trigger_apply-windows-theme.ps1.tmpl", WINDOWS_SCRIPT),
    ]);
    let s = settings();
    let linux = OsName::linux();
    let windows = OsName::windows();
    let on_linux = RenderContext::new(&linux, &s);
    let on_windows = RenderContext::new(&windows, &s);

    let sh = "run_dot_config/.theme-trigger_apply-wayfire-theme.sh.tmpl";
    let ps1 = "run_dot_config/.theme-trigger_apply-windows-theme.ps1.tmpl";

    let rendered = engine.render(sh, &on_linux).unwrap();
    assert!(rendered.starts_with("#!/bin/sh"));
    assert!(rendered.contains("themes/gruvbox.ini"));
    assert_eq!(engine.render(sh, &on_windows).unwrap(), "");

    let rendered = engine.render(ps1, &on_windows).unwrap();
    assert!(rendered.contains("$theme = \"gruvbox\""));
    assert_eq!(engine.render(ps1, &on_linux).unwrap(), "");
}

#[test]
fn gated_template_on_other_os_ignores_missing_keys() {
    let engine = TemplateEngine::from_sources([("run_win.ps1.tmpl", WINDOWS_SCRIPT)]);
    let empty = Settings::default();
    let linux = OsName::linux();
    assert_eq!(engine.render("run_win.ps1.tmpl", &RenderContext::new(&linux, &empty)).unwrap(), "");
}

#[rstest]
#[case::windows(OsName::windows(), "shell = \"pwsh.exe\"")]
#[case::linux(OsName::linux(), "shell = \"/bin/bash\"")]
#[case::darwin(OsName::darwin(), "shell = \"/bin/zsh\"")]
fn mixed_branches_pick_one_arm(#[case] os: OsName, #[case] expected: &str) {
    let engine = TemplateEngine::from_sources([("dot_config/term.toml.tmpl", TERMINAL_CONFIG)]);
    let s = settings();
    let out = engine.render("dot_config/term.toml.tmpl", &RenderContext::new(&os, &s)).unwrap();
    assert_eq!(
        out,
        format!("font = \"Agave Nerd Font\"\nsize = 12\n{expected}\n")
    );
}

#[test]
fn rendering_is_deterministic() {
    let engine = TemplateEngine::from_sources([("dot_config/term.toml.tmpl", TERMINAL_CONFIG)]);
    let s = settings();
    let os = OsName::linux();
    let ctx = RenderContext::new(&os, &s);
    let first = engine.render("dot_config/term.toml.tmpl", &ctx).unwrap();
    for _ in 0..10 {
        assert_eq!(engine.render("dot_config/term.toml.tmpl", &ctx).unwrap(), first);
    }
}

#[test]
fn value_rendering_uses_data_file_scalars() {
    let s: Settings = [
        ("current_theme", swatch_core::SettingValue::from("gruvbox")),
        ("font_size", swatch_core::SettingValue::from(14i64)),
    ]
    .into_iter()
    .collect();
    let engine = TemplateEngine::from_sources([("t.tmpl", "size={{ .font_size }}")]);
    let os = OsName::linux();
    assert_eq!(engine.render("t.tmpl", &RenderContext::new(&os, &s)).unwrap(), "size=14");
}

#[test]
fn missing_key_in_active_branch_names_template_and_key() {
    let engine = TemplateEngine::from_sources([(
        "dot_config/x.tmpl",
        "{{ if eq .os \"linux\" }}{{ .font_size }}{{ end }}",
    )]);
    let s = settings();
    let os = OsName::linux();
    let err = engine.render("dot_config/x.tmpl", &RenderContext::new(&os, &s)).unwrap_err();
    assert!(matches!(
        &err,
        RenderError::MissingKey { template, key } if template == "dot_config/x.tmpl" && key == "font_size"
    ));
    assert!(err.to_string().contains("font_size"));
}

#[rstest]
#[case::unterminated_if("{{ if eq .os \"linux\" }}x")]
#[case::stray_end("x{{ end }}")]
#[case::unknown_function("{{ if contains .os \"lin\" }}x{{ end }}")]
#[case::unclosed_action("{{ .current_theme ")]
fn malformed_templates_report_syntax_errors(#[case] source: &str) {
    let engine = TemplateEngine::from_sources([("bad.tmpl", source)]);
    assert_eq!(engine.specs().count(), 0);
    let (name, err) = &engine.failures()[0];
    assert_eq!(name, "bad.tmpl");
    assert!(matches!(err, RenderError::Syntax { .. }));
}

#[test]
fn source_tree_load_derives_kinds() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "dot_config/.theme-trigger.tmpl", "theme={{ .current_theme }}\n");
    write(dir.path(), "run_dot_config/.theme-trigger_apply-wayfire-theme.sh.tmpl", WAYFIRE_SCRIPT);

    let engine = TemplateEngine::load(dir.path()).unwrap();
    let kinds: Vec<_> = engine.specs().map(|s| s.kind().clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TemplateKind::Config { dest: Path::new(".config").join(".theme-trigger") },
            TemplateKind::Script { file_name: ".theme-trigger_apply-wayfire-theme.sh".into() },
        ]
    );
    let script = engine
        .get("run_dot_config/.theme-trigger_apply-wayfire-theme.sh.tmpl")
        .unwrap();
    assert_eq!(script.target_os(), Some(&OsName::linux()));
}
