// Control-sequence tables for the local converter
//
// Every control sequence the local converter understands appears either in
// SYMBOLS (leaf tokens) or STRUCTURAL (commands that take arguments). Anything
// else makes the local backend step aside for a full-grammar engine.

/// MathML rendering of a leaf control sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// Identifier (`<mi>`)
    Ident(&'static str),
    /// Operator (`<mo>`)
    Op(&'static str),
    /// Large operator that carries limits
    LargeOp(&'static str),
    /// Function name rendered upright (`<mi>sin</mi>`)
    Func(&'static str),
    /// Function name that takes limits below in display mode
    LimitFunc(&'static str),
    /// Horizontal space, width in em
    Space(&'static str),
}

pub static SYMBOLS: phf::Map<&'static str, Symbol> = phf::phf_map! {
    // Lowercase Greek
    "alpha" => Symbol::Ident("α"),
    "beta" => Symbol::Ident("β"),
    "gamma" => Symbol::Ident("γ"),
    "delta" => Symbol::Ident("δ"),
    "epsilon" => Symbol::Ident("ϵ"),
    "varepsilon" => Symbol::Ident("ε"),
    "zeta" => Symbol::Ident("ζ"),
    "eta" => Symbol::Ident("η"),
    "theta" => Symbol::Ident("θ"),
    "vartheta" => Symbol::Ident("ϑ"),
    "iota" => Symbol::Ident("ι"),
    "kappa" => Symbol::Ident("κ"),
    "lambda" => Symbol::Ident("λ"),
    "mu" => Symbol::Ident("μ"),
    "nu" => Symbol::Ident("ν"),
    "xi" => Symbol::Ident("ξ"),
    "pi" => Symbol::Ident("π"),
    "varpi" => Symbol::Ident("ϖ"),
    "rho" => Symbol::Ident("ρ"),
    "varrho" => Symbol::Ident("ϱ"),
    "sigma" => Symbol::Ident("σ"),
    "varsigma" => Symbol::Ident("ς"),
    "tau" => Symbol::Ident("τ"),
    "upsilon" => Symbol::Ident("υ"),
    "phi" => Symbol::Ident("ϕ"),
    "varphi" => Symbol::Ident("φ"),
    "chi" => Symbol::Ident("χ"),
    "psi" => Symbol::Ident("ψ"),
    "omega" => Symbol::Ident("ω"),

    // Uppercase Greek
    "Gamma" => Symbol::Ident("Γ"),
    "Delta" => Symbol::Ident("Δ"),
    "Theta" => Symbol::Ident("Θ"),
    "Lambda" => Symbol::Ident("Λ"),
    "Xi" => Symbol::Ident("Ξ"),
    "Pi" => Symbol::Ident("Π"),
    "Sigma" => Symbol::Ident("Σ"),
    "Upsilon" => Symbol::Ident("Υ"),
    "Phi" => Symbol::Ident("Φ"),
    "Psi" => Symbol::Ident("Ψ"),
    "Omega" => Symbol::Ident("Ω"),

    // Letter-like symbols
    "infty" => Symbol::Ident("∞"),
    "partial" => Symbol::Ident("∂"),
    "nabla" => Symbol::Ident("∇"),
    "hbar" => Symbol::Ident("ℏ"),
    "ell" => Symbol::Ident("ℓ"),
    "aleph" => Symbol::Ident("ℵ"),
    "emptyset" => Symbol::Ident("∅"),
    "Re" => Symbol::Ident("ℜ"),
    "Im" => Symbol::Ident("ℑ"),

    // Binary operators
    "pm" => Symbol::Op("±"),
    "mp" => Symbol::Op("∓"),
    "times" => Symbol::Op("×"),
    "div" => Symbol::Op("÷"),
    "cdot" => Symbol::Op("⋅"),
    "ast" => Symbol::Op("∗"),
    "circ" => Symbol::Op("∘"),
    "bullet" => Symbol::Op("∙"),
    "oplus" => Symbol::Op("⊕"),
    "otimes" => Symbol::Op("⊗"),
    "wedge" => Symbol::Op("∧"),
    "vee" => Symbol::Op("∨"),
    "cap" => Symbol::Op("∩"),
    "cup" => Symbol::Op("∪"),
    "setminus" => Symbol::Op("∖"),

    // Relations
    "leq" => Symbol::Op("≤"),
    "le" => Symbol::Op("≤"),
    "geq" => Symbol::Op("≥"),
    "ge" => Symbol::Op("≥"),
    "neq" => Symbol::Op("≠"),
    "ne" => Symbol::Op("≠"),
    "approx" => Symbol::Op("≈"),
    "equiv" => Symbol::Op("≡"),
    "sim" => Symbol::Op("∼"),
    "simeq" => Symbol::Op("≃"),
    "cong" => Symbol::Op("≅"),
    "propto" => Symbol::Op("∝"),
    "ll" => Symbol::Op("≪"),
    "gg" => Symbol::Op("≫"),
    "in" => Symbol::Op("∈"),
    "notin" => Symbol::Op("∉"),
    "ni" => Symbol::Op("∋"),
    "subset" => Symbol::Op("⊂"),
    "supset" => Symbol::Op("⊃"),
    "subseteq" => Symbol::Op("⊆"),
    "supseteq" => Symbol::Op("⊇"),
    "perp" => Symbol::Op("⊥"),
    "parallel" => Symbol::Op("∥"),
    "mid" => Symbol::Op("∣"),

    // Arrows
    "to" => Symbol::Op("→"),
    "rightarrow" => Symbol::Op("→"),
    "leftarrow" => Symbol::Op("←"),
    "gets" => Symbol::Op("←"),
    "leftrightarrow" => Symbol::Op("↔"),
    "Rightarrow" => Symbol::Op("⇒"),
    "Leftarrow" => Symbol::Op("⇐"),
    "Leftrightarrow" => Symbol::Op("⇔"),
    "implies" => Symbol::Op("⟹"),
    "iff" => Symbol::Op("⟺"),
    "mapsto" => Symbol::Op("↦"),
    "uparrow" => Symbol::Op("↑"),
    "downarrow" => Symbol::Op("↓"),

    // Logic
    "forall" => Symbol::Op("∀"),
    "exists" => Symbol::Op("∃"),
    "neg" => Symbol::Op("¬"),
    "land" => Symbol::Op("∧"),
    "lor" => Symbol::Op("∨"),

    // Delimiters usable on their own or after \left / \right
    "langle" => Symbol::Op("⟨"),
    "rangle" => Symbol::Op("⟩"),
    "lfloor" => Symbol::Op("⌊"),
    "rfloor" => Symbol::Op("⌋"),
    "lceil" => Symbol::Op("⌈"),
    "rceil" => Symbol::Op("⌉"),
    "vert" => Symbol::Op("|"),
    "Vert" => Symbol::Op("‖"),

    // Dots
    "ldots" => Symbol::Op("…"),
    "dots" => Symbol::Op("…"),
    "cdots" => Symbol::Op("⋯"),
    "vdots" => Symbol::Op("⋮"),
    "ddots" => Symbol::Op("⋱"),
    "prime" => Symbol::Op("′"),

    // Large operators
    "sum" => Symbol::LargeOp("∑"),
    "prod" => Symbol::LargeOp("∏"),
    "coprod" => Symbol::LargeOp("∐"),
    "int" => Symbol::LargeOp("∫"),
    "iint" => Symbol::LargeOp("∬"),
    "iiint" => Symbol::LargeOp("∭"),
    "oint" => Symbol::LargeOp("∮"),
    "bigcup" => Symbol::LargeOp("⋃"),
    "bigcap" => Symbol::LargeOp("⋂"),
    "bigvee" => Symbol::LargeOp("⋁"),
    "bigwedge" => Symbol::LargeOp("⋀"),

    // Functions
    "sin" => Symbol::Func("sin"),
    "cos" => Symbol::Func("cos"),
    "tan" => Symbol::Func("tan"),
    "cot" => Symbol::Func("cot"),
    "sec" => Symbol::Func("sec"),
    "csc" => Symbol::Func("csc"),
    "arcsin" => Symbol::Func("arcsin"),
    "arccos" => Symbol::Func("arccos"),
    "arctan" => Symbol::Func("arctan"),
    "sinh" => Symbol::Func("sinh"),
    "cosh" => Symbol::Func("cosh"),
    "tanh" => Symbol::Func("tanh"),
    "log" => Symbol::Func("log"),
    "ln" => Symbol::Func("ln"),
    "lg" => Symbol::Func("lg"),
    "exp" => Symbol::Func("exp"),
    "det" => Symbol::Func("det"),
    "dim" => Symbol::Func("dim"),
    "ker" => Symbol::Func("ker"),
    "deg" => Symbol::Func("deg"),
    "arg" => Symbol::Func("arg"),
    "gcd" => Symbol::Func("gcd"),
    "lim" => Symbol::LimitFunc("lim"),
    "limsup" => Symbol::LimitFunc("lim sup"),
    "liminf" => Symbol::LimitFunc("lim inf"),
    "max" => Symbol::LimitFunc("max"),
    "min" => Symbol::LimitFunc("min"),
    "sup" => Symbol::LimitFunc("sup"),
    "inf" => Symbol::LimitFunc("inf"),

    // Spacing
    "," => Symbol::Space("0.1667em"),
    ":" => Symbol::Space("0.2222em"),
    ";" => Symbol::Space("0.2778em"),
    " " => Symbol::Space("0.3333em"),
    "quad" => Symbol::Space("1em"),
    "qquad" => Symbol::Space("2em"),
    "!" => Symbol::Space("0em"),

    // Escaped literals
    "{" => Symbol::Op("{"),
    "}" => Symbol::Op("}"),
    "|" => Symbol::Op("‖"),
    "%" => Symbol::Op("%"),
    "$" => Symbol::Op("$"),
    "#" => Symbol::Op("#"),
    "_" => Symbol::Op("_"),
};

/// Commands with arguments handled by the parser itself
pub static STRUCTURAL: phf::Set<&'static str> = phf::phf_set! {
    "frac", "dfrac", "tfrac", "sqrt",
    "left", "right",
    "text", "textrm", "mathrm", "operatorname",
    "mathbf", "mathit", "mathbb", "mathcal", "mathsf", "boldsymbol",
    "displaystyle", "textstyle", "limits", "nolimits",
};

/// `mathvariant` for style commands
pub fn math_variant(command: &str) -> Option<&'static str> {
    match command {
        "mathbf" | "boldsymbol" => Some("bold"),
        "mathit" => Some("italic"),
        "mathbb" => Some("double-struck"),
        "mathcal" => Some("script"),
        "mathsf" => Some("sans-serif"),
        "mathrm" => Some("normal"),
        _ => None,
    }
}

/// Whether the local converter understands this control sequence name
#[inline]
pub fn is_supported(name: &str) -> bool {
    SYMBOLS.contains_key(name) || STRUCTURAL.contains(name)
}
