//! Instructions sent to the backend, each paired with the shape its answer must have.

use crate::generation::schema::{Property, Schema};
use crate::model::Category;

/// An instruction and the schema its answer is validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub instruction: &'static str,
    pub schema: Schema,
}

const CLASSIFICATION: &str = "\
Take a deep breath.

You are going to read an email and decide how likely it is to belong to each
of the categories below. Score every category: 0 when you are sure the email
is not of that category, 1 when you are sure it is, and any number in between
to express how strongly you lean towards it.

The categories:
    - commercial: a prospecting or promotional email.
    - bill: an invoice or a bill for a product or service that was sold.
    - conversation: a regular exchange between humans.

Clues to weigh. +X adds to a category, -X takes away from it.

Only a few sentences +bill -commercial
A total price +bill
A list of items that were sold +bill
\"bill\", \"invoice\", \"order confirmation\" or a synonym in the Subject +bill -commercial -conversation
Several benefits of a product are put forward +commercial -bill
Laid out as greeting, message, signature +conversation -bill
Several signatures and quoted replies +conversation -bill -commercial

Answer with this YAML:

bill: x
commercial: x
conversation: x

replacing each x with its score. If you find yourself giving 1 to two or more
categories, think again until you can tell them apart.

Output pure YAML only: no Markdown wrapping, no sentences.
";

const COMMERCIAL: &str = "\
This email looks like a commercial email. Find out which product it offers
and what value it promises.

Output nothing but parseable YAML with this structure:

product: \"x\"
usp: \"x\"

where product is the name of the product and usp its unique selling
proposition.
";

const BILL: &str = "\
This email contains a bill or an invoice. Report the total amount paid and,
when possible, every product or service that was bought.

Write every amount as [42, \"EUR\"], [12, \"USD\"] and so on: the first item
is the amount as a number, the second the ISO code of the currency.

Example output:

total: [x, x]  # Total amount of the invoice

If the email lists the items or services bought, also add:

bought: []  # Items bought

with one entry per item found, shaped like this:

label: \"x\"
price: [x, x]

label is the item's label as written in the email and price is the price of
that item, using the amount format above.

Output nothing but parseable YAML following the example above.
";

const CONVERSATION: &str = "\
The following email contains a conversation. Summarize its latest message
using this YAML structure:

summary: \"x\"

where x is the summary of the message.

Output valid YAML and only YAML, with no sentence around it.
";

/// `[amount, currency]`.
fn amount() -> Schema {
    Schema::tuple([Schema::number(), Schema::String])
}

/// Per-category likelihood scores.
pub fn classification() -> PromptSpec {
    PromptSpec {
        instruction: CLASSIFICATION,
        schema: Schema::object(
            Category::ALL
                .iter()
                .map(|c| Property::required(c.as_str(), Schema::number_between(0.0, 1.0))),
        ),
    }
}

pub fn commercial() -> PromptSpec {
    PromptSpec {
        instruction: COMMERCIAL,
        schema: Schema::object([
            Property::required("product", Schema::String),
            Property::required("usp", Schema::String),
        ]),
    }
}

pub fn bill() -> PromptSpec {
    PromptSpec {
        instruction: BILL,
        schema: Schema::object([
            Property::required("total", amount()),
            Property::optional(
                "bought",
                Schema::array(Schema::object([
                    Property::required("label", Schema::String),
                    Property::required("price", amount()),
                ])),
            ),
        ]),
    }
}

pub fn conversation() -> PromptSpec {
    PromptSpec {
        instruction: CONVERSATION,
        schema: Schema::object([Property::required("summary", Schema::String)]),
    }
}

/// The extraction prompt dedicated to `category`.
pub fn extraction(category: Category) -> PromptSpec {
    match category {
        Category::Commercial => commercial(),
        Category::Bill => bill(),
        Category::Conversation => conversation(),
    }
}
