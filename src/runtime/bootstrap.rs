use indexmap::IndexMap;

use std::collections::{HashMap, HashSet};

use crate::ast::SubclassKind;
use crate::runtime::object::{Behavior, Body, MethodImpl, ObjId, Value};
use crate::runtime::{CoreClasses, Runtime, RuntimeError, natives, primitives};

/// The classes that exist before the general definition path can work:
/// name, index of the superclass in this table, instance variables.
const ROOTS: [(&str, Option<usize>, &[&str]); 6] = [
    ("Object", None, &[]),
    ("Behavior", Some(0), &["superclass", "methodDict", "format"]),
    ("ClassDescription", Some(1), &["instanceVariables", "organization"]),
    ("Metaclass", Some(2), &["thisClass"]),
    (
        "Class",
        Some(2),
        &["subclasses", "name", "classPool", "sharedPools", "environment"],
    ),
    ("UndefinedObject", Some(0), &[]),
];

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Runtime {
    pub fn new() -> Runtime {
        let placeholder = ObjId(0);
        let mut rt = Runtime {
            objects: vec![],
            nil: placeholder,
            true_obj: placeholder,
            false_obj: placeholder,
            core: CoreClasses {
                object: placeholder,
                behavior: placeholder,
                metaclass: placeholder,
                class: placeholder,
                undefined_object: placeholder,
                small_integer: placeholder,
                large_positive: placeholder,
                large_negative: placeholder,
                float: placeholder,
                true_class: placeholder,
                false_class: placeholder,
                character: placeholder,
                array: placeholder,
                string: placeholder,
                symbol: placeholder,
                block_context: placeholder,
            },
            globals: IndexMap::new(),
            symbols: HashMap::new(),
            chars: vec![],
            primitives: primitives::table(),
            next_hash: 0,
            next_token: 0,
            selectors: HashSet::new(),
            depth: 0,
        };
        rt.nil = rt.alloc(placeholder, vec![], Body::Empty);
        rt.bootstrap_roots();
        rt.bootstrap_core();
        natives::install(&mut rt);
        log::debug!("runtime bootstrapped with {} objects", rt.objects.len());
        rt
    }

    /// Phase one: the six root classes and their metaclasses, wired by hand.
    fn bootstrap_roots(&mut self) {
        let placeholder = ObjId(0);
        let mut classes: Vec<ObjId> = vec![];
        let mut metas: Vec<ObjId> = vec![];
        for (name, superclass, inst_vars) in ROOTS {
            let meta = self.alloc(placeholder, vec![], Body::Empty);
            let class = self.alloc(meta, vec![], Body::Empty);

            let mut behavior = Behavior::new(name, superclass.map(|i| classes[i]), SubclassKind::Fixed);
            behavior.inst_vars = names(inst_vars);
            self.object_mut(class).behavior = Some(Box::new(behavior));

            let mut meta_behavior = Behavior::new(
                format!("{} class", name),
                superclass.map(|i| metas[i]),
                SubclassKind::Fixed,
            );
            meta_behavior.this_class = Some(class);
            self.object_mut(meta).behavior = Some(Box::new(meta_behavior));

            self.set_global(name, Value::Obj(class));
            classes.push(class);
            metas.push(meta);
        }

        let [object, behavior, _, metaclass, class, undefined_object] = [
            classes[0], classes[1], classes[2], classes[3], classes[4], classes[5],
        ];
        // every metaclass is a Metaclass, and `Object class` inherits from Class
        for meta in &metas {
            self.object_mut(*meta).class = metaclass;
        }
        if let Some(b) = self.behavior_mut(metas[0]) {
            b.superclass = Some(class);
        }
        self.object_mut(self.nil).class = undefined_object;

        // with the shape complete, slot counts are known
        let nil = self.nil();
        for id in classes.iter().chain(&metas) {
            let slots = self.all_inst_vars(self.object(*id).class).len();
            self.object_mut(*id).inst_vars = vec![nil; slots];
        }

        self.core.object = object;
        self.core.behavior = behavior;
        self.core.metaclass = metaclass;
        self.core.class = class;
        self.core.undefined_object = undefined_object;
    }

    /// Phase two: everything else goes through the general path.
    fn bootstrap_core(&mut self) {
        use SubclassKind::*;
        let object = self.core.object;

        let magnitude = self.create_class("Magnitude", Some(object), Fixed, &[], &[]);
        let number = self.create_class("Number", Some(magnitude), Fixed, &[], &[]);
        let integer = self.create_class("Integer", Some(number), Fixed, &[], &[]);
        self.core.small_integer = self.create_class("SmallInteger", Some(integer), Fixed, &[], &[]);
        self.core.large_positive = self.create_class("LargePositiveInteger", Some(integer), Byte, &[], &[]);
        self.core.large_negative =
            self.create_class("LargeNegativeInteger", Some(self.core.large_positive), Byte, &[], &[]);
        self.core.float = self.create_class("Float", Some(number), Fixed, &[], &[]);

        let boolean = self.create_class("Boolean", Some(object), Fixed, &[], &[]);
        self.core.true_class = self.create_class("True", Some(boolean), Fixed, &[], &[]);
        self.core.false_class = self.create_class("False", Some(boolean), Fixed, &[], &[]);
        self.true_obj = self.alloc(self.core.true_class, vec![], Body::Empty);
        self.false_obj = self.alloc(self.core.false_class, vec![], Body::Empty);

        self.core.character = self.create_class(
            "Character",
            Some(magnitude),
            Fixed,
            &names(&["value"]),
            &names(&["CharacterTable"]),
        );

        let collection = self.create_class("Collection", Some(object), Fixed, &[], &names(&["RandomForPicking"]));
        let sequenceable = self.create_class("SequenceableCollection", Some(collection), Fixed, &[], &[]);
        let arrayed = self.create_class("ArrayedCollection", Some(sequenceable), Fixed, &[], &[]);
        self.core.array = self.create_class("Array", Some(arrayed), Variable, &[], &names(&["EmptyArray"]));
        self.core.string = self.create_class("String", Some(arrayed), Byte, &[], &[]);
        self.core.symbol = self.create_class("Symbol", Some(self.core.string), Byte, &[], &[]);

        let stream = self.create_class(
            "InstructionStream",
            Some(object),
            Fixed,
            &names(&["sender", "pc"]),
            &names(&["SpecialConstants"]),
        );
        let context = self.create_class(
            "ContextPart",
            Some(stream),
            Fixed,
            &names(&["stackp"]),
            &names(&["PrimitiveFailToken"]),
        );
        self.core.block_context = self.create_class(
            "BlockContext",
            Some(context),
            Fixed,
            &names(&["nargs", "startpc", "home"]),
            &[],
        );

        let character = self.core.character;
        let chars: Vec<ObjId> = (0..256i64)
            .map(|code| self.alloc(character, vec![Value::Int(code)], Body::Empty))
            .collect();
        let table = self.array(chars.iter().map(|c| Value::Obj(*c)).collect());
        self.chars = chars;
        if let Some(b) = self.behavior_mut(character) {
            b.class_vars.insert("CharacterTable".to_string(), table);
        }

        // single-character symbols exist before anything interns text
        for code in 0u8..128 {
            self.symbol(&(code as char).to_string());
        }
    }

    /// Makes a class and its metaclass. The metaclass inherits from the
    /// superclass's metaclass, or from Class at a root.
    pub(crate) fn create_class(
        &mut self,
        name: &str,
        superclass: Option<ObjId>,
        kind: SubclassKind,
        inst_vars: &[String],
        class_vars: &[String],
    ) -> ObjId {
        let nil = self.nil();
        let meta_super = match superclass {
            Some(s) => self.object(s).class,
            None => self.core.class,
        };
        let meta_slots = self.all_inst_vars(self.core.metaclass).len();
        let meta = self.alloc(self.core.metaclass, vec![nil; meta_slots], Body::Empty);
        self.object_mut(meta).behavior = Some(Box::new(Behavior::new(
            format!("{} class", name),
            Some(meta_super),
            SubclassKind::Fixed,
        )));

        let class_slots = self.all_inst_vars(meta).len();
        let class = self.alloc(meta, vec![nil; class_slots], Body::Empty);
        let mut behavior = Behavior::new(name, superclass, kind);
        behavior.inst_vars = inst_vars.to_vec();
        behavior.class_vars = class_vars.iter().map(|v| (v.clone(), nil)).collect();
        self.object_mut(class).behavior = Some(Box::new(behavior));
        if let Some(b) = self.behavior_mut(meta) {
            b.this_class = Some(class);
        }

        self.set_global(name, Value::Obj(class));
        log::debug!("defined class {}", name);
        class
    }

    /// Defines a class, or reopens an existing one: its superclass must stay
    /// the same (Object may be redeclared as a root), and new instance or
    /// class variables are added.
    pub fn def_class(
        &mut self,
        name: &str,
        superclass: Option<ObjId>,
        kind: SubclassKind,
        inst_vars: &[String],
        class_vars: &[String],
    ) -> Result<ObjId, RuntimeError> {
        let Some(existing) = self.class_named(name) else {
            return Ok(self.create_class(name, superclass, kind, inst_vars, class_vars));
        };
        let current = self.behavior(existing).and_then(|b| b.superclass);
        if current != superclass && !(name == "Object" && superclass.is_none()) {
            return Err(RuntimeError::SuperclassChanged(name.to_string()));
        }
        let nil = self.nil();
        if let Some(b) = self.behavior_mut(existing) {
            for v in inst_vars {
                if !b.inst_vars.contains(v) {
                    b.inst_vars.push(v.clone());
                }
            }
            for v in class_vars {
                b.class_vars.entry(v.clone()).or_insert(nil);
            }
        }
        Ok(existing)
    }

    /// Declares instance variables of `class`'s metaclass.
    pub fn add_class_inst_vars(&mut self, class: ObjId, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let meta = self.object(class).class;
        if let Some(b) = self.behavior_mut(meta) {
            for name in names {
                if !b.inst_vars.contains(name) {
                    b.inst_vars.push(name.clone());
                }
            }
        }
        let slots = self.all_inst_vars(meta).len();
        let nil = self.nil();
        self.object_mut(class).inst_vars.resize(slots, nil);
    }

    /// Adds or replaces one method; `class` is a metaclass for class-side methods.
    pub fn add_method(&mut self, class: ObjId, selector: &str, method: MethodImpl) {
        if let Some(b) = self.behavior_mut(class) {
            b.methods.insert(selector.to_string(), method);
            self.selectors.insert(selector.to_string());
        }
    }
}
