//! Page templates
//!
//! Placeholders are written `@@NAME@@` and filled in a single pass, so text
//! substituted into one placeholder is never scanned for another.
//!
//! Script templates use `r##"..."##` delimiters: CSS selectors such as
//! `"#paper"` would close an `r#` string.

pub const DOCUMENT: &str = r#"<!DOCTYPE html>
<html>
	<head>
		<meta charset="UTF-8">
		<title>@@TITLE@@</title>
@@SCRIPTS@@	</head>
	<body>
		<div>
			<button id="@@BUTTON_ID@@">@@BUTTON_LABEL@@</button>
		</div>
		<div id="rasterize_command"></div>
		<div id="paper"></div>
	</body>
</html>
"#;

pub const SCRIPT_SRC: &str = r#"		<script type="text/javascript" src="@@SRC@@" charset="utf-8"></script>
"#;

pub const ON_LOAD: &str = r#"		<script>
			addEventListener("load", @@ASYNC@@() => {
@@BODY@@			});
		</script>
"#;

pub const DIGITALJS_INIT: &str = r##"				const circuit = new digitaljs.Circuit(@@DATA@@, { engine: digitaljs.engines.BrowserSynchEngine });
				const paper = circuit.displayOn(document.querySelector("#paper"));
				circuit.start();
"##;

pub const NETLISTSVG_INIT: &str = r##"				const svg = await netlistsvg.render(netlistsvg.digitalSkin, @@DATA@@, undefined, undefined, @@OPTIONS@@);
				document.querySelector("#paper").innerHTML = svg;
"##;

pub const EXPORT_HANDLER: &str = r##"				document.getElementById(@@BUTTON_ID@@).addEventListener("click", () => {
					let svg = document.querySelector("#paper > svg");
					const width = svg.clientWidth;
					const height = svg.clientHeight;
					svg = svg.cloneNode(true);

					svg.setAttribute("width", `${ width }px`);
					svg.setAttribute("height", `${ height }px`);

					{
						let zoom = "";
						if (width > @@MAX_DIMENSION@@ || height > @@MAX_DIMENSION@@) {
							zoom = `--zoom ${ @@MAX_DIMENSION@@ / Math.max(width, height) } `;
						}
						const rasterizeCommand = document.getElementById("rasterize_command");
						rasterizeCommand.innerText = @@RASTERIZE_PREFIX@@ + zoom + @@RASTERIZE_SUFFIX@@;
					}

					{
						const url =
							URL.createObjectURL(
								new File(
									[
										new XMLSerializer().serializeToString(svg),
									],
									@@SVG_NAME@@,
									{ type: "image/svg+xml" },
								),
							);
						const anchor = document.createElement("a");
						anchor.href = url;
						anchor.download = @@SVG_NAME@@;
						anchor.click();
					}
				});
"##;

/// Substitute `@@NAME@@` placeholders. Unknown names are kept verbatim.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("@@") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("@@") {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("@@");
                        out.push_str(key);
                        out.push_str("@@");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Escape text for HTML element content and quoted attributes.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_is_single_pass() {
        let filled = fill("a=@@A@@ b=@@B@@", &[("A", "@@B@@"), ("B", "two")]);
        assert_eq!(filled, "a=@@B@@ b=two");
    }

    #[test]
    fn test_fill_keeps_unknown_and_unterminated() {
        assert_eq!(fill("x @@NOPE@@ y", &[]), "x @@NOPE@@ y");
        assert_eq!(fill("tail @@OPEN", &[("OPEN", "v")]), "tail @@OPEN");
    }

    #[test]
    fn test_script_templates_keep_selectors() {
        assert!(DIGITALJS_INIT.contains(r##"document.querySelector("#paper")"##));
        assert!(DIGITALJS_INIT.ends_with("circuit.start();\n"));
        assert!(NETLISTSVG_INIT.trim_end().ends_with(r##"document.querySelector("#paper").innerHTML = svg;"##));
        assert!(EXPORT_HANDLER.contains(r##"document.querySelector("#paper > svg")"##));
        assert!(EXPORT_HANDLER.trim_end().ends_with("});"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
