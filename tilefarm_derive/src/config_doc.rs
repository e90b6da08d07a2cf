use syn::Type;

pub fn collect_doc(attrs: &[syn::Attribute]) -> String {
	let mut lines: Vec<String> = Vec::new();
	for attr in attrs {
		if !attr.path().is_ident("doc") {
			continue;
		}
		match &attr.meta {
			syn::Meta::NameValue(nv) => {
				if let syn::Expr::Lit(expr_lit) = &nv.value {
					if let syn::Lit::Str(lit) = &expr_lit.lit {
						let v = lit.value();
						lines.push(v.trim().to_string());
					}
				}
			}
			_ => {}
		}
	}
	lines.join("\n")
}

pub fn serde_rename(attrs: &[syn::Attribute]) -> Option<String> {
	for attr in attrs {
		if attr.path().is_ident("serde") {
			let mut out: Option<String> = None;
			let _ = attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("rename") {
					if let Ok(v) = meta.value() {
						if let Ok(s) = v.parse::<syn::LitStr>() {
							out = Some(s.value());
						}
					}
				}
				Ok(())
			});
			if out.is_some() {
				return out;
			}
		}
	}
	None
}

pub fn is_option(ty: &Type) -> bool {
	if let Type::Path(tp) = ty {
		if let Some(seg) = tp.path.segments.last() {
			return seg.ident == "Option";
		}
	}
	false
}
