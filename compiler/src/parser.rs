use crate::{
    ast::{
        DefaultValue, EnumBuilder, ListBuilder, MapDecl, MemberBuilder, MemberDecl, Scope,
        ScopeBuilder, StructBuilder, TypedefDecl, UnionBuilder, VariantBuilder,
    },
    error::SchemaError,
    options::CompilerOptions,
    tokenizer::Token,
    types::TypeRef,
    utils::{error, quote},
};
use brine_wire_schema::ByteOrder;
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER:    Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref INTEGER:       Regex = Regex::new(r"^(0x[0-9A-Fa-f]+|-?\d+)$").unwrap();
    static ref STRING:        Regex = Regex::new(r#"^".*"$"#).unwrap();
    static ref EQUALS:        Regex = Regex::new(r"^=$").unwrap();
    static ref SEMICOLON:     Regex = Regex::new(r"^;$").unwrap();
    static ref COLON:         Regex = Regex::new(r"^:$").unwrap();
    static ref COMMA:         Regex = Regex::new(r"^,$").unwrap();
    static ref PATH_SEP:      Regex = Regex::new(r"^::$").unwrap();
    static ref LEFT_BRACE:    Regex = Regex::new(r"^\{$").unwrap();
    static ref RIGHT_BRACE:   Regex = Regex::new(r"^\}$").unwrap();
    static ref LEFT_BRACKET:  Regex = Regex::new(r"^\[$").unwrap();
    static ref RIGHT_BRACKET: Regex = Regex::new(r"^\]$").unwrap();
    static ref LEFT_ANGLE:    Regex = Regex::new(r"^<$").unwrap();
    static ref RIGHT_ANGLE:   Regex = Regex::new(r"^>$").unwrap();
    static ref LEFT_PAREN:    Regex = Regex::new(r"^\($").unwrap();
    static ref RIGHT_PAREN:   Regex = Regex::new(r"^\)$").unwrap();
    static ref SCOPE_KW:      Regex = Regex::new(r"^scope$").unwrap();
    static ref STRUCT_KW:     Regex = Regex::new(r"^struct$").unwrap();
    static ref UNION_KW:      Regex = Regex::new(r"^union$").unwrap();
    static ref VARIANT_KW:    Regex = Regex::new(r"^variant$").unwrap();
    static ref LIST_KW:       Regex = Regex::new(r"^list$").unwrap();
    static ref ENUM_KW:       Regex = Regex::new(r"^enum$").unwrap();
    static ref MAP_KW:        Regex = Regex::new(r"^map$").unwrap();
    static ref TYPEDEF_KW:    Regex = Regex::new(r"^typedef$").unwrap();
    static ref EXTENDS_KW:    Regex = Regex::new(r"^extends$").unwrap();
    static ref SWITCH_KW:     Regex = Regex::new(r"^switch$").unwrap();
    static ref CASE_KW:       Regex = Regex::new(r"^case$").unwrap();
    static ref MISSING_KW:    Regex = Regex::new(r"^missing$").unwrap();
    static ref AS_KW:         Regex = Regex::new(r"^as$").unwrap();
    static ref REQUIRED_KW:   Regex = Regex::new(r"^required$").unwrap();
    static ref NETWORK_KW:    Regex = Regex::new(r"^network$").unwrap();
    static ref NATIVE_KW:     Regex = Regex::new(r"^native$").unwrap();
    static ref NULL_KW:       Regex = Regex::new(r"^null$").unwrap();
    static ref EOF:           Regex = Regex::new(r"^$").unwrap();
}

static END: Token = Token {
    text:   String::new(),
    line:   0,
    column: 0,
};

/// Parses a token stream into the root scope.
pub fn parse_schema(tokens: &[Token], options: &CompilerOptions) -> Result<Scope, SchemaError> {
    let mut parser = Parser {
        tokens,
        index: 0,
        options,
    };
    let root = parser.declarations(ScopeBuilder::root(), false)?;
    root.build()
}

struct Parser<'t> {
    tokens:  &'t [Token],
    index:   usize,
    options: &'t CompilerOptions,
}

/// A parsed type: the reference plus any `<...>` arguments.
struct TypeSyntax {
    ty:   TypeRef,
    args: Vec<TypeRef>,
}

impl<'t> Parser<'t> {
    fn current(&self) -> &'t Token {
        self.tokens.get(self.index).unwrap_or(&END)
    }

    fn eat(&mut self, test: &Regex) -> bool {
        if test.is_match(&self.current().text) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, test: &Regex, expected: &str) -> Result<&'t Token, SchemaError> {
        let tok = self.current();
        if !self.eat(test) {
            return Err(error(
                &format!("Expected {} but found {}", expected, quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }
        Ok(tok)
    }

    fn unexpected_token(&self) -> SchemaError {
        let tok = self.current();
        error(&format!("Unexpected token {}", quote(&tok.text)), tok.line, tok.column)
    }

    fn identifier(&mut self) -> Result<String, SchemaError> {
        Ok(self.expect(&IDENTIFIER, "identifier")?.text.clone())
    }

    fn integer(&mut self) -> Result<i64, SchemaError> {
        let tok = self.expect(&INTEGER, "integer")?;
        let parsed = match tok.text.strip_prefix("0x") {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => tok.text.parse::<i64>(),
        };
        parsed.map_err(|_| {
            error(&format!("Invalid integer {}", quote(&tok.text)), tok.line, tok.column)
        })
    }

    fn type_name(&mut self) -> Result<String, SchemaError> {
        let mut text = String::new();
        if self.eat(&PATH_SEP) {
            text.push_str("::");
        }
        text.push_str(&self.identifier()?);
        while self.eat(&PATH_SEP) {
            text.push_str("::");
            text.push_str(&self.identifier()?);
        }
        Ok(text)
    }

    fn type_syntax(&mut self) -> Result<TypeSyntax, SchemaError> {
        let ty = TypeRef::from_name(&self.type_name()?);
        let mut args = Vec::new();
        if self.eat(&LEFT_ANGLE) {
            loop {
                let arg = self.type_syntax()?;
                if !arg.args.is_empty() {
                    return Err(self.unexpected_token());
                }
                args.push(arg.ty);
                if !self.eat(&COMMA) {
                    break;
                }
            }
            self.expect(&RIGHT_ANGLE, "\">\"")?;
        }
        Ok(TypeSyntax { ty, args })
    }

    fn plain_type(&mut self) -> Result<TypeRef, SchemaError> {
        let tok = self.current();
        let syntax = self.type_syntax()?;
        if !syntax.args.is_empty() {
            return Err(error(
                &format!("Type {} takes no arguments here", quote(&syntax.ty.to_string())),
                tok.line,
                tok.column,
            ));
        }
        Ok(syntax.ty)
    }

    fn declarations(
        &mut self,
        mut scope: ScopeBuilder,
        nested: bool,
    ) -> Result<ScopeBuilder, SchemaError> {
        loop {
            if nested && self.eat(&RIGHT_BRACE) {
                return Ok(scope);
            }
            if !nested && self.eat(&EOF) {
                return Ok(scope);
            }

            if self.eat(&SCOPE_KW) {
                let name = self.identifier()?;
                self.expect(&LEFT_BRACE, "\"{\"")?;
                let child = self.declarations(ScopeBuilder::new(&name), true)?;
                scope = scope.scope(child.build()?);
            } else if self.eat(&STRUCT_KW) {
                scope = scope.declare(self.struct_decl()?);
            } else if self.eat(&UNION_KW) {
                scope = scope.declare(self.union_decl()?);
            } else if self.eat(&VARIANT_KW) {
                scope = scope.declare(self.variant_decl()?);
            } else if self.eat(&LIST_KW) {
                scope = scope.declare(self.list_decl()?);
            } else if self.eat(&ENUM_KW) {
                scope = scope.declare(self.enum_decl()?);
            } else if self.eat(&MAP_KW) {
                scope = scope.declare(self.map_decl()?);
            } else if self.eat(&TYPEDEF_KW) {
                let original = TypeRef::from_name(&self.type_name()?);
                self.expect(&AS_KW, "\"as\"")?;
                let name = self.identifier()?;
                self.expect(&SEMICOLON, "\";\"")?;
                scope = scope.declare(TypedefDecl::new(original, &name));
            } else {
                return Err(self.unexpected_token());
            }
        }
    }

    fn struct_decl(&mut self) -> Result<crate::ast::StructDecl, SchemaError> {
        let name = self.identifier()?;
        trace!("parsing struct {}", name);
        let mut builder = StructBuilder::new(&name);
        if self.eat(&EXTENDS_KW) {
            builder = builder.supertype(TypeRef::from_name(&self.type_name()?));
        }
        if self.eat(&LEFT_BRACKET) {
            let tok = self.current();
            let id = self.integer()?;
            let id = u32::try_from(id)
                .map_err(|_| error(&format!("Invalid type id {}", id), tok.line, tok.column))?;
            builder = builder.type_id(id);
            self.expect(&RIGHT_BRACKET, "\"]\"")?;
        }
        self.expect(&LEFT_BRACE, "\"{\"")?;
        while !self.eat(&RIGHT_BRACE) {
            builder = builder.member(self.member()?);
        }
        builder.build()
    }

    fn list_decl(&mut self) -> Result<crate::ast::ListDecl, SchemaError> {
        let framing = if self.eat(&LEFT_ANGLE) {
            let length = self.plain_type()?;
            self.expect(&COMMA, "\",\"")?;
            let count = self.plain_type()?;
            self.expect(&RIGHT_ANGLE, "\">\"")?;
            Some((length, count))
        } else {
            None
        };
        let name = self.identifier()?;
        trace!("parsing list {}", name);
        let mut builder = ListBuilder::new(&name);
        if let Some((length, count)) = framing {
            builder = builder.framing(length, count);
        }
        self.expect(&LEFT_BRACE, "\"{\"")?;
        while !self.eat(&RIGHT_BRACE) {
            builder = builder.member(self.member()?);
        }
        builder.build()
    }

    fn switch_type(&mut self) -> Result<TypeRef, SchemaError> {
        self.expect(&SWITCH_KW, "\"switch\"")?;
        self.expect(&LEFT_PAREN, "\"(\"")?;
        let ty = self.plain_type()?;
        self.expect(&RIGHT_PAREN, "\")\"")?;
        Ok(ty)
    }

    fn case_tag(&mut self) -> Result<i64, SchemaError> {
        self.expect(&CASE_KW, "\"case\"")?;
        let tag = self.integer()?;
        self.expect(&COLON, "\":\"")?;
        Ok(tag)
    }

    fn union_decl(&mut self) -> Result<crate::ast::UnionDecl, SchemaError> {
        let name = self.identifier()?;
        let mut builder = UnionBuilder::new(&name, self.switch_type()?);
        self.expect(&LEFT_BRACE, "\"{\"")?;
        while !self.eat(&RIGHT_BRACE) {
            let tag = self.case_tag()?;
            builder = builder.case(tag, self.member()?);
        }
        builder.build()
    }

    fn variant_decl(&mut self) -> Result<crate::ast::VariantDecl, SchemaError> {
        let name = self.identifier()?;
        let mut builder = VariantBuilder::new(&name, self.switch_type()?);
        self.expect(&LEFT_BRACE, "\"{\"")?;
        while !self.eat(&RIGHT_BRACE) {
            let tag = self.case_tag()?;
            builder = if self.eat(&MISSING_KW) {
                builder.missing(tag)
            } else {
                builder.case(tag, self.plain_type()?)
            };
            self.expect(&SEMICOLON, "\";\"")?;
        }
        builder.build()
    }

    fn enum_decl(&mut self) -> Result<crate::ast::EnumDecl, SchemaError> {
        let name = self.identifier()?;
        let mut builder = EnumBuilder::new(&name);
        if self.eat(&LEFT_PAREN) {
            builder = builder.backing(self.plain_type()?);
            self.expect(&RIGHT_PAREN, "\")\"")?;
        }
        self.expect(&LEFT_BRACE, "\"{\"")?;
        while !self.eat(&RIGHT_BRACE) {
            let value = self.identifier()?;
            let ordinal = if self.eat(&EQUALS) {
                Some(self.integer()?)
            } else {
                None
            };
            builder = builder.value(&value, ordinal);
            if !self.eat(&COMMA) {
                self.expect(&RIGHT_BRACE, "\"}\"")?;
                break;
            }
        }
        builder.build()
    }

    fn map_decl(&mut self) -> Result<MapDecl, SchemaError> {
        let name = self.identifier()?;
        let template = TypeRef::from_name(&self.type_name()?);
        self.expect(&LEFT_ANGLE, "\"<\"")?;
        let key = self.plain_type()?;
        self.expect(&COMMA, "\",\"")?;
        let value = self.plain_type()?;
        self.expect(&RIGHT_ANGLE, "\">\"")?;
        self.expect(&SEMICOLON, "\";\"")?;
        Ok(MapDecl::new(&name, template, key, value))
    }

    fn member(&mut self) -> Result<MemberDecl, SchemaError> {
        let required = self.eat(&REQUIRED_KW);
        let order = if self.eat(&NETWORK_KW) {
            ByteOrder::Network
        } else if self.eat(&NATIVE_KW) {
            ByteOrder::Native
        } else {
            self.options.default_byte_order
        };

        let syntax = self.type_syntax()?;
        let name = self.identifier()?;
        let mut builder = MemberBuilder::new(&name, syntax.ty)
            .required(required)
            .byte_order(order);
        for arg in syntax.args {
            builder = builder.type_arg(arg);
        }

        if self.eat(&LEFT_BRACKET) {
            let tok = self.current();
            if IDENTIFIER.is_match(&tok.text) {
                builder = builder.size_field(&self.identifier()?);
            } else {
                let length = self.integer()?;
                let length = usize::try_from(length).map_err(|_| {
                    error(&format!("Invalid array length {}", length), tok.line, tok.column)
                })?;
                builder = builder.fixed_length(length);
            }
            self.expect(&RIGHT_BRACKET, "\"]\"")?;
        }

        if self.eat(&EQUALS) {
            builder = builder.default_value(self.default_value()?);
        }
        self.expect(&SEMICOLON, "\";\"")?;
        Ok(builder.build())
    }

    fn default_value(&mut self) -> Result<DefaultValue, SchemaError> {
        let tok = self.current();
        if self.eat(&NULL_KW) {
            Ok(DefaultValue::Null)
        } else if INTEGER.is_match(&tok.text) {
            Ok(DefaultValue::Int(self.integer()?))
        } else if self.eat(&STRING) {
            let text: String = serde_json::from_str(&tok.text)
                .map_err(|_| error(&format!("Invalid string {}", tok.text), tok.line, tok.column))?;
            Ok(DefaultValue::Text(text))
        } else if self.eat(&IDENTIFIER) {
            Ok(DefaultValue::Symbol(tok.text.clone()))
        } else {
            Err(self.unexpected_token())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Declaration, tokenizer::tokenize_schema, types::TypeKind};

    fn parse(text: &str) -> Result<Scope, SchemaError> {
        parse_schema(&tokenize_schema(text)?, &CompilerOptions::default())
    }

    #[test]
    fn parses_struct_members() {
        let scope = parse(
            "struct Frame extends Base [0x10] {
                network uint16 port = 80;
                uint8 length;
                octets payload[length];
                string8 name = \"anon\";
                array32<varint32> values;
            }",
        )
        .unwrap();
        let Some(Declaration::Struct(frame)) = scope.declaration("Frame") else {
            panic!("expected a struct");
        };
        assert_eq!(frame.type_id, 16);
        assert_eq!(frame.supertype, Some(TypeRef::dynamic("Base")));
        assert_eq!(frame.members.len(), 5);
        assert_eq!(frame.members[0].byte_order, ByteOrder::Network);
        assert_eq!(frame.members[0].default, DefaultValue::Int(80));
        assert!(frame.members[1].used_as_size);
        assert_eq!(frame.members[2].size_name.as_deref(), Some("length"));
        assert_eq!(frame.members[3].default, DefaultValue::Text("anon".into()));
        assert_eq!(frame.members[4].ty, TypeRef::framed(TypeKind::Array, 32));
        assert_eq!(frame.members[4].type_args, vec![TypeRef::VARINT32]);
    }

    #[test]
    fn parses_nested_scopes() {
        let scope = parse("scope geo { scope inner { struct P { int8 x; } } enum Axis { X, Y = 4, Z, } }").unwrap();
        let geo = scope.scope("geo").unwrap();
        assert_eq!(geo.depth, 1);
        assert!(geo.scope("inner").unwrap().declaration("P").is_some());
        let Some(Declaration::Enum(axis)) = geo.declaration("Axis") else {
            panic!("expected an enum");
        };
        let ordinals: Vec<i64> = axis.values.iter().map(|v| v.ordinal).collect();
        assert_eq!(ordinals, vec![0, 4, 5]);
    }

    #[test]
    fn parses_unions_variants_lists_maps() {
        let scope = parse(
            "union Shape switch (uint8) { case 1: int32 circle; case 2: string8 label; }
             variant Opt switch (uint8) { case 0x40: missing; case 0x41: int8; case 0x42: int64; }
             list<uint16, uint8> Row { required int32 id; Opt extra; }
             map Index map32<string8, int64>;
             typedef ::Row as Line;",
        )
        .unwrap();
        assert!(matches!(scope.declaration("Shape"), Some(Declaration::Union(u)) if u.cases.len() == 2));
        assert!(matches!(
            scope.declaration("Opt"),
            Some(Declaration::Variant(v)) if v.missing_field_value == Some(0x40)
        ));
        assert!(matches!(
            scope.declaration("Row"),
            Some(Declaration::List(l)) if l.length_type == TypeRef::UINT16 && l.members[0].required
        ));
        assert!(matches!(
            scope.declaration("Index"),
            Some(Declaration::Map(m)) if m.template == TypeRef::framed(TypeKind::Map, 32)
        ));
        assert!(matches!(
            scope.declaration("Line"),
            Some(Declaration::Typedef(t)) if t.original.to_string() == "::Row"
        ));
    }

    #[test]
    fn default_byte_order_comes_from_options() {
        let options = CompilerOptions {
            default_byte_order: ByteOrder::Network,
            ..CompilerOptions::default()
        };
        let tokens = tokenize_schema("struct S { int32 a; native int32 b; }").unwrap();
        let scope = parse_schema(&tokens, &options).unwrap();
        let Some(Declaration::Struct(s)) = scope.declaration("S") else {
            panic!("expected a struct");
        };
        assert_eq!(s.members[0].byte_order, ByteOrder::Network);
        assert_eq!(s.members[1].byte_order, ByteOrder::Native);
    }

    #[test]
    fn reports_position_of_bad_token() {
        let err = parse("struct S {\n  int8 x\n}").unwrap_err();
        assert!(
            matches!(err, SchemaError::ParseError { line: 3, column: 1, .. }),
            "unexpected error {:?}",
            err
        );
    }
}
