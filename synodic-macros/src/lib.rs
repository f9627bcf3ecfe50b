use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, Result, Type, parse_macro_input};

/// Derive macro for configuration sections with inline default values.
///
/// Generates two things:
/// - a `Default` implementation built from each field's `#[default(...)]`
///   expression (string literals on `String` fields are converted with
///   `.into()`, everything else is used as written);
/// - an associated `FIELDS` constant listing the field names in declaration
///   order, which the configuration loader uses to flag unknown keys.
///
/// # Example
/// ```
/// use synodic_macros::ConfigDefaults;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(ConfigDefaults, Serialize, Deserialize)]
/// #[serde(default)]
/// pub struct OutputConfig {
///     #[default(0.0)]
///     pub t_start: f64,
///
///     #[default(30.0)]
///     pub t_end: f64,
///
///     #[default(200)]
///     pub points: usize,
///
///     #[default("trajectory")]
///     pub label: String,
/// }
///
/// let config = OutputConfig::default();
/// assert_eq!(config.t_end, 30.0);
/// assert_eq!(config.points, 200);
/// assert_eq!(config.label, "trajectory");
/// assert_eq!(OutputConfig::FIELDS, &["t_start", "t_end", "points", "label"]);
/// ```
///
/// # Errors
///
/// Compilation fails when the derive is applied to anything other than a
/// struct with named fields, or when a field is missing its `#[default(...)]`
/// attribute or leaves it empty. Every offending field is reported, not just
/// the first one.
#[proc_macro_derive(ConfigDefaults, attributes(default))]
pub fn config_defaults(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// A named field together with the expression it defaults to.
struct FieldDefault<'a> {
    ident: &'a Ident,
    is_string: bool,
    value: proc_macro2::TokenStream,
}

fn expand(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let fields = named_fields(input)?;
    let defaults = collect_defaults(fields)?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let initializers = defaults.iter().map(|field| {
        let ident = field.ident;
        let value = &field.value;
        if field.is_string {
            quote! { #ident: ::std::convert::Into::into(#value) }
        } else {
            quote! { #ident: #value }
        }
    });
    let field_names = defaults
        .iter()
        .map(|field| field.ident.unraw().to_string());

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::std::default::Default for #name #ty_generics #where_clause {
            fn default() -> Self {
                Self {
                    #(#initializers),*
                }
            }
        }

        #[automatically_derived]
        impl #impl_generics #name #ty_generics #where_clause {
            /// Field names in declaration order.
            pub const FIELDS: &'static [&'static str] = &[#(#field_names),*];
        }
    })
}

fn named_fields(
    input: &DeriveInput,
) -> Result<&syn::punctuated::Punctuated<Field, syn::token::Comma>> {
    let message = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => return Ok(&fields.named),
            Fields::Unnamed(_) => "ConfigDefaults only supports structs with named fields",
            Fields::Unit => "ConfigDefaults cannot be derived for unit structs",
        },
        Data::Enum(_) => "ConfigDefaults can only be derived for structs, not enums",
        Data::Union(_) => "ConfigDefaults can only be derived for structs, not unions",
    };
    Err(Error::new_spanned(input, message))
}

/// Parse every field, combining all attribute errors into one diagnostic.
fn collect_defaults<'a>(
    fields: impl IntoIterator<Item = &'a Field>,
) -> Result<Vec<FieldDefault<'a>>> {
    let mut defaults = Vec::new();
    let mut errors: Option<Error> = None;

    for field in fields {
        match parse_field(field) {
            Ok(parsed) => defaults.push(parsed),
            Err(err) => match errors.as_mut() {
                Some(combined) => combined.combine(err),
                None => errors = Some(err),
            },
        }
    }

    match errors {
        Some(err) => Err(err),
        None => Ok(defaults),
    }
}

fn parse_field(field: &Field) -> Result<FieldDefault<'_>> {
    let Some(ident) = field.ident.as_ref() else {
        return Err(Error::new_spanned(field, "expected a named field"));
    };
    let display_name = ident.unraw().to_string();

    let Some(attr) = field.attrs.iter().find(|attr| attr.path().is_ident("default")) else {
        return Err(Error::new_spanned(
            field,
            format!(
                "Field '{display_name}' must have a #[default(...)] attribute specifying its default value"
            ),
        ));
    };

    let value: proc_macro2::TokenStream = attr.parse_args().map_err(|e| {
        Error::new_spanned(
            attr,
            format!("Failed to parse default attribute for field '{display_name}': {e}"),
        )
    })?;

    if value.is_empty() {
        return Err(Error::new_spanned(
            attr,
            format!(
                "Field '{display_name}' has an empty #[default()] attribute. Please provide a default value."
            ),
        ));
    }

    Ok(FieldDefault {
        ident,
        is_string: is_string_type(&field.ty),
        value,
    })
}

fn is_string_type(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "String"),
        _ => false,
    }
}
